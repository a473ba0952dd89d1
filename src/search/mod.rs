// Catalog search module
// Presenter state for the search box, talking to an off-thread index worker

pub mod grouping;
pub mod links;
pub mod presenter;
pub mod protocol;
pub mod query;
pub mod worker;

pub use grouping::{group_results, ResultGroup};
pub use presenter::SearchPresenter;
pub use worker::{ChannelWorker, SearchWorker};
