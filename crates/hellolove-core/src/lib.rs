pub mod config;
pub mod conversation;
pub mod interpreter;
pub mod session;
pub mod settings;
pub mod speech;
pub mod tasks;
pub mod voice;

pub use config::*;
pub use conversation::*;
pub use interpreter::*;
pub use session::*;
pub use settings::*;
pub use speech::*;
pub use tasks::*;
pub use voice::*;
