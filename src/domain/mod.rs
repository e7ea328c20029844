// Domain layer: 資料模型與對外介面（ports），不依賴具體的儲存或設定實作。

pub mod model;
pub mod ports;
