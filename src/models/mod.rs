pub mod forecast;
pub mod preference;
pub mod reminder;
pub mod risk;

pub use forecast::*;
pub use preference::*;
pub use reminder::*;
pub use risk::*;
