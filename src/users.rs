//! Process-wide user table (spec §3 "User record").
//!
//! Grounded on `examples/original_source/src/auth/auth.c` for lookup
//! semantics (linear scan, reject blank names) and on the teacher's
//! pre-sized `Table<K, V>` wrapper (`crates/service/src/session/mod.rs`).

use parking_lot::RwLock;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub name: String,
    pub password: String,
}

pub struct UserTable {
    capacity: usize,
    users: RwLock<Vec<UserRecord>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AddUserError {
    BlankName,
    Exists,
    Full,
}

impl UserTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            users: RwLock::new(Vec::with_capacity(capacity.min(DEFAULT_CAPACITY))),
        }
    }

    pub fn with_initial(capacity: usize, initial: &[(String, String)]) -> Self {
        let table = Self::new(capacity);
        for (name, password) in initial {
            let _ = table.add(name.clone(), password.clone());
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn add(&self, name: String, password: String) -> Result<(), AddUserError> {
        if name.trim().is_empty() {
            return Err(AddUserError::BlankName);
        }

        let mut users = self.users.write();
        if users.len() >= self.capacity {
            return Err(AddUserError::Full);
        }
        if users.iter().any(|u| u.name == name) {
            return Err(AddUserError::Exists);
        }

        users.push(UserRecord { name, password });
        Ok(())
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.name != name);
        users.len() != before
    }

    pub fn verify(&self, name: &str, password: &str) -> bool {
        self.users
            .read()
            .iter()
            .any(|u| u.name == name && u.password == password)
    }

    pub fn names(&self) -> Vec<String> {
        self.users.read().iter().map(|u| u.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        let table = UserTable::new(4);
        assert_eq!(table.add("   ".into(), "pw".into()), Err(AddUserError::BlankName));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let table = UserTable::new(4);
        assert!(table.add("alice".into(), "pw".into()).is_ok());
        assert_eq!(
            table.add("alice".into(), "pw2".into()),
            Err(AddUserError::Exists)
        );
    }

    #[test]
    fn adduser_twice_first_succeeds_second_fails() {
        let table = UserTable::new(4);
        assert!(table.add("bob".into(), "secret".into()).is_ok());
        assert!(table.add("bob".into(), "secret".into()).is_err());
    }

    #[test]
    fn table_never_exceeds_capacity() {
        let table = UserTable::new(1);
        assert!(table.add("a".into(), "p".into()).is_ok());
        assert_eq!(table.add("b".into(), "p".into()), Err(AddUserError::Full));
    }

    #[test]
    fn verify_checks_name_and_password() {
        let table = UserTable::new(4);
        table.add("alice".into(), "pw".into()).unwrap();
        assert!(table.verify("alice", "pw"));
        assert!(!table.verify("alice", "wrong"));
        assert!(!table.verify("bob", "pw"));
    }

    #[test]
    fn remove_deletes_existing_user_only() {
        let table = UserTable::new(4);
        table.add("alice".into(), "pw".into()).unwrap();
        assert!(table.remove("alice"));
        assert!(!table.remove("alice"));
    }
}
