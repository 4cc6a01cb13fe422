//! 基础设施层
//!
//! 持有稀缺资源（HTTP 连接池），只暴露能力，不认识业务对象。

pub mod bounded;
pub mod http_executor;

pub use bounded::{bounded, Interrupted};
pub use http_executor::HttpExecutor;
