//! Remote tree model: nodes, the listing fold, and the lazily resolved tree.

mod merge;
mod model;
mod node;
mod view_state;

pub use merge::FoldStats;
pub use model::TreeModel;
pub use node::{Node, NodeKind, RemoteEntry};
pub use view_state::{PendingEdit, ViewState};
