pub mod advertisement;
pub mod constraint;
pub mod discovery;
pub mod response;
