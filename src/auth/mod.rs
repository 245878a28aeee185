pub mod cookie;
pub mod hmac;
pub mod password;
pub mod token;

pub use self::hmac::KeyedHasher;
pub use password::PasswordHasher;
