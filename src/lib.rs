//! `qforest`: distributed, 2:1-balanced, Morton-ordered quadtree forests
//! over a coarse multi-tree connectivity.
//!
//! The crate is organized one module per component: [`quadrant`] (anchor
//! arithmetic, ordering, ancestry), [`tree`] (a single tree's leaf
//! sequence), [`connectivity`] (coarse-mesh topology and its text format),
//! [`completion`]/[`balance`]/[`linearize`] (the three mesh-construction
//! passes), [`ghost`] (cross-tree boundary exchange), [`partition`] and
//! [`repartition`] (global leaf distribution and reshuffling), [`transport`]
//! (the MPI surface, narrowed to a trait), [`forest`] (the public
//! aggregate), and [`vtk`] (visualization export).

pub mod balance;
pub mod completion;
pub mod connectivity;
pub mod constants;
pub mod error;
pub mod forest;
pub mod ghost;
pub mod linearize;
pub mod partition;
pub mod payload;
pub mod predicates;
pub mod quadrant;
pub mod repartition;
pub mod transport;
pub mod tree;
pub mod vtk;

pub use balance::BalanceMode;
pub use connectivity::Connectivity;
pub use error::ForestError;
pub use forest::Forest;
pub use payload::Payload;
pub use quadrant::Quadrant;
pub use transport::{SingleProcessTransport, Transport};
