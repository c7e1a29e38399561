//! Domain models shared between server and clients

pub mod cart;
pub mod product;

pub use cart::{
    AddItemRequest, Cart, CartItem, CartItemView, CartSummary, ProductBrief, RemoveItemRequest,
    UpdateItemRequest,
};
pub use product::{Product, ProductCreate, ProductUpdate};
