//! `ffmarket-orders` — order/checkout reconciler domain.
//!
//! Cart pricing from server-held prices, order/line-item records with price
//! snapshots, and order-number generation. The two-phase persistence saga
//! around these types lives in `ffmarket-infra`.

pub mod cart;
pub mod number;
pub mod order;

pub use cart::{price_cart, CartLine, CheckoutPolicy, PricedLine, ProductSnapshot, Quote};
pub use number::{generate_order_number, ORDER_NUMBER_PREFIX};
pub use order::{Order, OrderItem, OrderStatus, ShippingAddress};
