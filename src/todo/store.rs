//! In-memory todo list with synchronous change notification.
//!
//! The store is owned by the UI thread. Every effective mutation runs to
//! completion and then calls each subscriber with the change and the new
//! snapshot, so the next frame always renders current state.

use std::fmt;

use super::{Todo, TodoError, SAMPLE_TODOS};

/// What happened to the list. Each variant carries the affected id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoChange {
    Added(String),
    Toggled(String),
    Removed(String),
    MarkedDone(String),
    Updated(String),
}

impl TodoChange {
    pub fn id(&self) -> &str {
        match self {
            TodoChange::Added(id)
            | TodoChange::Toggled(id)
            | TodoChange::Removed(id)
            | TodoChange::MarkedDone(id)
            | TodoChange::Updated(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&TodoChange, &[Todo])>;

pub struct TodoStore {
    todos: Vec<Todo>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl fmt::Debug for TodoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoStore")
            .field("todos", &self.todos)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Default for TodoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoStore {
    pub fn new() -> Self {
        Self {
            todos: Vec::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Store pre-filled with the sample list (duplicate content included).
    pub fn with_samples() -> Self {
        let mut store = Self::new();
        store.todos = SAMPLE_TODOS.iter().map(|c| Todo::new(*c)).collect();
        store
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.todos.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|t| t.done).count()
    }

    /// Register a callback fired after every effective mutation.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TodoChange, &[Todo]) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Append a new open item. Duplicate content yields a distinct item.
    pub fn add(&mut self, content: impl Into<String>) -> Todo {
        let todo = Todo::new(content);
        tracing::debug!(id = %todo.id, content = %todo.content, "todo added");
        self.todos.push(todo.clone());
        self.notify(TodoChange::Added(todo.id.clone()));
        todo
    }

    /// Flip `done`. Unknown ids are ignored.
    pub fn toggle(&mut self, id: &str) {
        let Some(todo) = self.todos.iter_mut().find(|t| t.id == id) else {
            tracing::debug!(id, "toggle ignored: unknown id");
            return;
        };
        todo.done = !todo.done;
        tracing::debug!(id, done = todo.done, "todo toggled");
        self.notify(TodoChange::Toggled(id.to_string()));
    }

    /// Delete the item. Unknown ids are ignored.
    pub fn remove(&mut self, id: &str) {
        let Some(pos) = self.todos.iter().position(|t| t.id == id) else {
            tracing::debug!(id, "remove ignored: unknown id");
            return;
        };
        self.todos.remove(pos);
        tracing::debug!(id, "todo removed");
        self.notify(TodoChange::Removed(id.to_string()));
    }

    pub fn mark_done(&mut self, id: &str) -> Result<Todo, TodoError> {
        let todo = self
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        let changed = !todo.done;
        todo.done = true;
        let updated = todo.clone();
        if changed {
            tracing::debug!(id, "todo marked done");
            self.notify(TodoChange::MarkedDone(id.to_string()));
        }
        Ok(updated)
    }

    /// Replace `content`; `id` and `done` are left alone.
    pub fn update(&mut self, id: &str, content: impl Into<String>) -> Result<Todo, TodoError> {
        let content = content.into();
        let todo = self
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;
        let changed = todo.content != content;
        todo.content = content;
        let updated = todo.clone();
        if changed {
            tracing::debug!(id, content = %updated.content, "todo updated");
            self.notify(TodoChange::Updated(id.to_string()));
        }
        Ok(updated)
    }

    fn notify(&mut self, change: TodoChange) {
        let todos = &self.todos;
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&change, todos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn id_of(store: &TodoStore, content: &str) -> String {
        store
            .todos()
            .iter()
            .find(|t| t.content == content)
            .map(|t| t.id.clone())
            .unwrap()
    }

    #[test]
    fn adds_append_with_unique_ids() {
        let mut store = TodoStore::new();
        for _ in 0..25 {
            store.add("same text");
        }
        assert_eq!(store.len(), 25);
        let ids: HashSet<&str> = store.todos().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 25);
    }

    #[test]
    fn add_appends_last_and_open() {
        let mut store = TodoStore::with_samples();
        let created = store.add("Walk the dog");
        assert_eq!(store.len(), 4);
        assert_eq!(store.todos().last(), Some(&created));
        assert!(!created.done);
    }

    #[test]
    fn samples_have_distinct_ids_for_duplicate_content() {
        let store = TodoStore::with_samples();
        assert_eq!(store.len(), 3);
        assert_eq!(store.todos()[0].content, store.todos()[2].content);
        assert_ne!(store.todos()[0].id, store.todos()[2].id);
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut store = TodoStore::with_samples();
        let id = id_of(&store, "Buy Milk");
        store.toggle(&id);
        assert!(store.get(&id).unwrap().done);
        store.toggle(&id);
        assert!(!store.get(&id).unwrap().done);
    }

    #[test]
    fn toggle_and_remove_unknown_are_noops() {
        let mut store = TodoStore::with_samples();
        let before = store.snapshot();
        store.toggle("missing");
        store.remove("missing");
        assert_eq!(store.todos(), before.as_slice());
    }

    #[test]
    fn removed_id_reports_not_found() {
        let mut store = TodoStore::with_samples();
        let id = id_of(&store, "Buy Milk");
        store.remove(&id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.mark_done(&id), Err(TodoError::NotFound(id.clone())));
        assert_eq!(
            store.update(&id, "Buy oat milk"),
            Err(TodoError::NotFound(id.clone()))
        );
        store.toggle(&id);
        store.remove(&id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn mark_done_is_idempotent() {
        let mut store = TodoStore::with_samples();
        let id = id_of(&store, "Buy Milk");
        let first = store.mark_done(&id).unwrap();
        let second = store.mark_done(&id).unwrap();
        assert!(first.done);
        assert_eq!(first, second);
    }

    #[test]
    fn update_changes_only_content() {
        let mut store = TodoStore::with_samples();
        let id = id_of(&store, "Buy Milk");
        store.toggle(&id);
        let updated = store.update(&id, "Buy oat milk").unwrap();
        assert_eq!(updated.id, id);
        assert!(updated.done);
        assert_eq!(updated.content, "Buy oat milk");
        assert_eq!(store.todos()[1], updated);
    }

    #[test]
    fn subscribers_see_change_and_snapshot() {
        let mut store = TodoStore::new();
        let seen: Rc<RefCell<Vec<(TodoChange, usize)>>> = Rc::default();
        let sink = seen.clone();
        store.subscribe(move |change, todos| {
            sink.borrow_mut().push((change.clone(), todos.len()));
        });

        let a = store.add("a");
        store.toggle(&a.id);
        store.update(&a.id, "b").unwrap();
        store.remove(&a.id);

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                (TodoChange::Added(a.id.clone()), 1),
                (TodoChange::Toggled(a.id.clone()), 1),
                (TodoChange::Updated(a.id.clone()), 1),
                (TodoChange::Removed(a.id.clone()), 0),
            ]
        );
    }

    #[test]
    fn no_notification_without_effective_change() {
        let mut store = TodoStore::with_samples();
        let id = id_of(&store, "Buy Milk");
        store.mark_done(&id).unwrap();

        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        store.subscribe(move |_, _| *sink.borrow_mut() += 1);

        store.toggle("missing");
        store.remove("missing");
        store.mark_done(&id).unwrap();
        store.update(&id, "Buy Milk").unwrap();
        let _ = store.mark_done("missing");
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut store = TodoStore::new();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let sub = store.subscribe(move |_, _| *sink.borrow_mut() += 1);

        store.add("one");
        assert!(store.unsubscribe(sub));
        store.add("two");
        assert!(!store.unsubscribe(sub));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn change_exposes_id() {
        assert_eq!(TodoChange::Removed("x".into()).id(), "x");
        assert_eq!(TodoChange::MarkedDone("y".into()).id(), "y");
    }
}
