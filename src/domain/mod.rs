pub mod club;
pub mod fee;
pub mod invoice;
pub mod member;
pub mod payment;

pub use club::*;
pub use fee::*;
pub use invoice::*;
pub use member::*;
pub use payment::*;
