use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::event::{Event, EventQueue, LslEvent};
use crate::eval::value::Value;

use super::{Service, ServiceStatus};

/// Notecard store and delayed `dataserver` replies.
///
/// Notecards come from the configured map first, then from `notecard_dir`
/// (`<name>` or `<name>.txt`).
pub struct DataserverService {
    queue: Arc<EventQueue>,
    delay: Duration,
    notecards: HashMap<String, Vec<String>>,
    dir: Option<PathBuf>,
}

impl DataserverService {
    pub fn new(
        queue: Arc<EventQueue>,
        delay: Duration,
        notecards: HashMap<String, Vec<String>>,
        dir: Option<PathBuf>,
    ) -> Self {
        Self {
            queue,
            delay,
            notecards,
            dir,
        }
    }

    pub fn notecard(&self, name: &str) -> Option<Vec<String>> {
        if let Some(lines) = self.notecards.get(name) {
            return Some(lines.clone());
        }
        let dir = self.dir.as_deref()?;
        read_notecard(dir, name)
    }

    /// Enqueues `dataserver(query_id, data)` after the configured delay.
    pub fn reply(&self, query_id: &str, data: String) {
        let queue = self.queue.clone();
        let delay = self.delay;
        let event = Event::new(
            LslEvent::Dataserver,
            vec![Value::key(query_id), Value::String(data)],
        );
        trace!("dataserver reply for {} in {:?}", query_id, delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.push(event) {
                debug!("dataserver reply dropped: {}", e);
            }
        });
    }
}

fn read_notecard(dir: &Path, name: &str) -> Option<Vec<String>> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return None;
    }
    [dir.join(name), dir.join(format!("{}.txt", name))]
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .map(|text| text.lines().map(str::to_string).collect())
}

#[async_trait]
impl Service for DataserverService {
    fn name(&self) -> &'static str {
        "dataserver"
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus::Idle
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(queue: Arc<EventQueue>, dir: Option<PathBuf>) -> DataserverService {
        let mut notecards = HashMap::new();
        notecards.insert("config".to_string(), vec!["a".to_string(), "b".to_string()]);
        DataserverService::new(queue, Duration::from_millis(1), notecards, dir)
    }

    #[test]
    fn test_notecard_from_map_and_dir() {
        let dir = std::env::temp_dir().join(format!("linden-notecards-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("greeting.txt"), "hello\nworld\n").unwrap();

        let ds = service(Arc::new(EventQueue::new(4)), Some(dir.clone()));
        assert_eq!(ds.notecard("config").unwrap().len(), 2);
        assert_eq!(
            ds.notecard("greeting"),
            Some(vec!["hello".to_string(), "world".to_string()])
        );
        assert_eq!(ds.notecard("missing"), None);
        assert_eq!(ds.notecard("../greeting"), None);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_reply_is_delayed() {
        let queue = Arc::new(EventQueue::new(4));
        let ds = service(queue.clone(), None);
        let id = uuid::Uuid::new_v4().to_string();
        ds.reply(&id, "line".to_string());
        assert!(queue.is_empty());

        queue.wait(Duration::from_secs(1)).await;
        let event = queue.pop().unwrap();
        assert_eq!(event.kind, LslEvent::Dataserver);
        assert_eq!(event.args, vec![Value::Key(id), Value::from("line")]);
    }
}
