// Components module - reusable UI building blocks

pub mod toast;

pub use toast::Toast;
