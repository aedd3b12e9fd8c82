pub mod gateway;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod role;
pub mod validation;
