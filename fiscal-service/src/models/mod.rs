pub mod apuration;
pub mod bloco_k;
pub mod difal;
pub mod nfse;
pub mod obligation;

pub use apuration::*;
pub use bloco_k::*;
pub use difal::*;
pub use nfse::*;
pub use obligation::*;
