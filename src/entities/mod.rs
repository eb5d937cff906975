// Entity Models - the typed shapes this layer reasons about
//
// Records come back from the repository as loose attribute maps; each model
// here decodes once at the boundary and everything downstream stays typed.

pub mod item;
pub mod payment;
pub mod reference;
pub mod vote;

pub use item::{Comment, ImageRef, Item};
pub use payment::{
    Billing, CheckoutLink, CheckoutSession, EntitlementChange, PaymentStatus, Plan, PlanTerms,
    SessionMetadata,
};
pub use reference::{ReferenceEntity, ReferenceKind, Tag};
pub use vote::{TagVote, VoteState, VoteType};
