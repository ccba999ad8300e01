mod clock;
pub mod session;
mod token;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use session::CookieSession;
pub use session::MemorySession;
pub use session::SessionBackend;
pub use token::TokenStore;
