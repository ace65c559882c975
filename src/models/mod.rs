pub mod message;
pub mod session;
pub mod user;

pub use message::{EnvelopeType, Message, MessageDraft, MessageOrder};
pub use session::{SessionClaims, SessionCredential, SessionIssuer};
pub use user::UserIdentity;
