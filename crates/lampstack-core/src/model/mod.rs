//! モデル定義
//!
//! lampstackで使用されるリソースモデルを定義します。
//! 各モデルはリソースの種類ごとにモジュールに分離されています。

mod compute;
mod dns;
mod load_balancer;
mod network;
mod port;
mod security;
mod stack;
mod task;
mod volume;

// Re-exports
pub use compute::*;
pub use dns::*;
pub use load_balancer::*;
pub use network::*;
pub use port::*;
pub use security::*;
pub use stack::*;
pub use task::*;
pub use volume::*;
