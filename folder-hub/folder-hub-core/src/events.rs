use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which cached views went stale.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "scope", content = "id", rename_all = "lowercase")]
pub enum ChangeScope {
    /// Folder listings in general (departments, personal spaces).
    Tree,
    Folder(Uuid),
    Users,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Change {
    pub scope: ChangeScope,
}

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Change>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    /// Fire and forget; having no subscribers is fine.
    pub fn notify(&self, scope: ChangeScope) {
        let _ = self.tx.send(Change { scope });
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_changes() {
        let bus = ChangeNotifier::new();
        bus.notify(ChangeScope::Tree);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        bus.notify(ChangeScope::Folder(id));
        assert_eq!(rx.recv().await.unwrap().scope, ChangeScope::Folder(id));
    }
}
