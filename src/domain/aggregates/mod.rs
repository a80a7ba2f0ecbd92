//! Aggregates module
pub mod product;
pub mod review;
pub mod cart;
pub mod customer;
pub mod order;
pub mod tag;

pub use product::{Collection, Product, ProductDraft, ProductSummary};
pub use review::{Review, ReviewDraft};
pub use cart::{Cart, CartItem, CartLine};
pub use customer::{Customer, CustomerDraft, NewUser, User};
pub use order::{LineDraft, Order, OrderError, OrderLine};
pub use tag::{Tag, TaggedItem, PRODUCT_CONTENT_TYPE};
