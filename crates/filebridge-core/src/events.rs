//! 通知总线
//!
//! 接收端向界面等观察者单向广播“上传完成”信号。信号不带数据，
//! 观察者收到后应重新拉取历史记录。

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// 默认缓冲区大小，落后的订阅者会收到 `Lagged`
const DEFAULT_CAPACITY: usize = 64;

/// 服务器事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    #[serde(rename = "upload:completed")]
    UploadCompleted,
}

impl ServerEvent {
    /// 事件名称
    pub fn name(self) -> &'static str {
        match self {
            ServerEvent::UploadCompleted => "upload:completed",
        }
    }
}

/// 单生产者、多消费者的事件通道
///
/// 发布永不阻塞：没有订阅者时事件直接丢弃。
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[test]
    fn test_publish_without_subscribers() {
        let bus = NotificationBus::new();
        assert_eq!(bus.publish(ServerEvent::UploadCompleted), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = NotificationBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(ServerEvent::UploadCompleted), 2);
        assert_eq!(a.recv().await.unwrap(), ServerEvent::UploadCompleted);
        assert_eq!(b.recv().await.unwrap(), ServerEvent::UploadCompleted);
        assert!(matches!(a.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_slow_subscriber_never_blocks_publisher() {
        let bus = NotificationBus::with_capacity(2);
        let mut slow = bus.subscribe();

        for _ in 0..10 {
            bus.publish(ServerEvent::UploadCompleted);
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(_))));
        assert_eq!(slow.recv().await.unwrap(), ServerEvent::UploadCompleted);
    }

    #[test]
    fn test_event_wire_name() {
        let json = serde_json::to_string(&ServerEvent::UploadCompleted).unwrap();
        assert_eq!(json, "\"upload:completed\"");
        assert_eq!(ServerEvent::UploadCompleted.name(), "upload:completed");
    }
}
