//! Persistence port and its implementations.
//!
//! The engine only talks to the `Store` trait. `JsonStore` persists the whole
//! database to a JSON file with an atomic write on every upsert, which is the
//! storage model the CLI uses. `MemoryStore` keeps everything in memory and
//! can be told to fail writes, which is how the engine tests exercise the
//! partial-failure contracts.

use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::task::Task;
use crate::user::{Project, User};

/// Upsert-by-id persistence for tasks, users and projects.
///
/// `save_*` return the confirmed value as stored, so callers re-synchronize
/// from a single source of truth rather than trusting their local object.
pub trait Store {
    fn save_task(&mut self, task: &Task) -> Result<Task>;
    fn save_user(&mut self, user: &User) -> Result<User>;
    fn save_project(&mut self, project: &Project) -> Result<Project>;

    fn load_task(&self, id: &str) -> Result<Option<Task>>;
    fn load_tasks(&self) -> Result<Vec<Task>>;
    /// Tasks currently assigned to the given user.
    fn load_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .load_tasks()?
            .into_iter()
            .filter(|t| t.assigned_to.as_deref() == Some(user_id))
            .collect())
    }
    fn load_users(&self) -> Result<Vec<User>>;
    fn load_projects(&self) -> Result<Vec<Project>>;

    fn delete_task(&mut self, id: &str) -> Result<bool>;
}

fn upsert_task(db: &mut Database, task: &Task) {
    match db.tasks.iter_mut().find(|t| t.id == task.id) {
        Some(slot) => *slot = task.clone(),
        None => db.tasks.push(task.clone()),
    }
}

fn upsert_user(db: &mut Database, user: &User) {
    match db.users.iter_mut().find(|u| u.id == user.id) {
        Some(slot) => *slot = user.clone(),
        None => db.users.push(user.clone()),
    }
}

fn upsert_project(db: &mut Database, project: &Project) {
    match db.projects.iter_mut().find(|p| p.id == project.id) {
        Some(slot) => *slot = project.clone(),
        None => db.projects.push(project.clone()),
    }
}

/// File-backed store: the whole database is one JSON document, rewritten
/// atomically on every mutation.
pub struct JsonStore {
    path: PathBuf,
    db: Database,
}

impl JsonStore {
    /// Open the store at the given path, loading existing data if present.
    pub fn open(path: &Path) -> Self {
        JsonStore {
            path: path.to_path_buf(),
            db: Database::load(path),
        }
    }

    /// Read access to the loaded database, for listing commands.
    pub fn db(&self) -> &Database {
        &self.db
    }

    fn flush(&self) -> Result<()> {
        self.db.save(&self.path).map_err(Error::from)
    }
}

impl Store for JsonStore {
    fn save_task(&mut self, task: &Task) -> Result<Task> {
        upsert_task(&mut self.db, task);
        self.flush()?;
        Ok(task.clone())
    }

    fn save_user(&mut self, user: &User) -> Result<User> {
        upsert_user(&mut self.db, user);
        self.flush()?;
        Ok(user.clone())
    }

    fn save_project(&mut self, project: &Project) -> Result<Project> {
        upsert_project(&mut self.db, project);
        self.flush()?;
        Ok(project.clone())
    }

    fn load_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.db.get_task(id).cloned())
    }

    fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.db.tasks.clone())
    }

    fn load_users(&self) -> Result<Vec<User>> {
        Ok(self.db.users.clone())
    }

    fn load_projects(&self) -> Result<Vec<Project>> {
        Ok(self.db.projects.clone())
    }

    fn delete_task(&mut self, id: &str) -> Result<bool> {
        let before = self.db.tasks.len();
        self.db.tasks.retain(|t| t.id != id);
        let removed = self.db.tasks.len() != before;
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }
}

/// In-memory store with switchable write failures.
#[derive(Default)]
pub struct MemoryStore {
    pub db: Database,
    /// When set, `save_task` fails with a persistence error.
    pub fail_task_saves: bool,
    /// When set, `save_user` fails with a persistence error.
    pub fail_user_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn save_task(&mut self, task: &Task) -> Result<Task> {
        if self.fail_task_saves {
            return Err(Error::Persistence("task store unavailable".into()));
        }
        upsert_task(&mut self.db, task);
        Ok(task.clone())
    }

    fn save_user(&mut self, user: &User) -> Result<User> {
        if self.fail_user_saves {
            return Err(Error::Persistence("user store unavailable".into()));
        }
        upsert_user(&mut self.db, user);
        Ok(user.clone())
    }

    fn save_project(&mut self, project: &Project) -> Result<Project> {
        upsert_project(&mut self.db, project);
        Ok(project.clone())
    }

    fn load_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.db.get_task(id).cloned())
    }

    fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.db.tasks.clone())
    }

    fn load_users(&self) -> Result<Vec<User>> {
        Ok(self.db.users.clone())
    }

    fn load_projects(&self) -> Result<Vec<Project>> {
        Ok(self.db.projects.clone())
    }

    fn delete_task(&mut self, id: &str) -> Result<bool> {
        let before = self.db.tasks.len();
        self.db.tasks.retain(|t| t.id != id);
        Ok(self.db.tasks.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Priority, Role, Status};
    use crate::user::User;

    fn sample_task(id: &str) -> Task {
        Task {
            id: id.into(),
            title: "Sample".into(),
            description: "A sample task".into(),
            project_id: "p1".into(),
            assigned_to: Some("u1".into()),
            created_by: "u1".into(),
            created_at: 0,
            deadline: None,
            completed_at: None,
            status: Status::Todo,
            priority: Priority::Low,
            subtasks: Vec::new(),
            comments: Vec::new(),
            activity_log: Vec::new(),
            time_spent: 0,
            timer_started_at: None,
            tags: Vec::new(),
            depends_on: Vec::new(),
            attachments: Vec::new(),
            progress: 0,
            order: 1,
        }
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");

        let mut store = JsonStore::open(&path);
        store.save_task(&sample_task("t1")).unwrap();
        store.save_user(&User::new("ada", Role::Admin)).unwrap();

        let reopened = JsonStore::open(&path);
        assert_eq!(reopened.load_tasks().unwrap().len(), 1);
        assert_eq!(reopened.load_users().unwrap().len(), 1);
        assert_eq!(reopened.load_task("t1").unwrap().unwrap().title, "Sample");
    }

    #[test]
    fn test_save_task_upserts_by_id() {
        let mut store = MemoryStore::new();
        store.save_task(&sample_task("t1")).unwrap();
        let mut edited = sample_task("t1");
        edited.title = "Edited".into();
        store.save_task(&edited).unwrap();
        let tasks = store.load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Edited");
    }

    #[test]
    fn test_load_tasks_for_user_filters_by_assignment() {
        let mut store = MemoryStore::new();
        store.save_task(&sample_task("t1")).unwrap();
        let mut other = sample_task("t2");
        other.assigned_to = Some("u2".into());
        store.save_task(&other).unwrap();

        let mine = store.load_tasks_for_user("u1").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "t1");
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let mut store = MemoryStore::new();
        store.fail_task_saves = true;
        assert!(store.save_task(&sample_task("t1")).is_err());
        assert!(store.load_tasks().unwrap().is_empty());
    }
}
