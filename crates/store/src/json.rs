//! JSON-document billing store.
//!
//! All tables live in one document.  Reads and writes go through an
//! in-memory copy guarded by a mutex; the file is rewritten after every
//! write made outside a transaction and on every commit.  A transaction
//! keeps a snapshot of the tables from `begin_transaction` so `rollback`
//! can put it back.  A write outside a transaction that fails, in memory
//! or on disk, leaves the tables as they were.
//!
//! A file-backed store holds an `fs2` exclusive lock on `<path>.lock` for
//! its whole lifetime.  Each store rewrites the entire document, so a
//! second writer on the same file would silently erase the first one's
//! records; opening a locked store fails instead.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use sn_domain::error::{Error, Result};
use sn_domain::{MemberId, TerminalId};

use crate::record::{MemberRecord, StartupReport, TerminalRecord, VoucherRecord};
use crate::store::BillingStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Document
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    members: BTreeMap<MemberId, MemberRecord>,
    /// Keyed by voucher code.
    #[serde(default)]
    vouchers: BTreeMap<String, VoucherRecord>,
    #[serde(default)]
    terminals: BTreeMap<TerminalId, TerminalRecord>,
    #[serde(default)]
    next_voucher_id: u64,
}

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    /// Tables as they were at `begin_transaction`.
    snapshot: Option<Tables>,
}

impl Inner {
    fn member_mut(&mut self, member_id: MemberId) -> Result<&mut MemberRecord> {
        self.tables
            .members
            .get_mut(&member_id)
            .ok_or_else(|| Error::NotFound(format!("member {member_id}")))
    }

    fn voucher_mut(&mut self, code: &str) -> Result<&mut VoucherRecord> {
        self.tables
            .vouchers
            .get_mut(code)
            .ok_or_else(|| Error::NotFound(format!("voucher {code}")))
    }
}

fn load_tables(path: &Path) -> Result<Tables> {
    if !path.exists() {
        return Ok(Tables::default());
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    if raw.trim().is_empty() {
        return Ok(Tables::default());
    }
    serde_json::from_str(&raw).map_err(|e| Error::Store(format!("parsing {}: {e}", path.display())))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JsonStore {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    /// Held for as long as the store may write `path`.
    _lock: Option<File>,
    inner: Mutex<Inner>,
}

/// Sibling file whose exclusive lock marks the owner of the store at `path`.
pub fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("json.lock")
}

impl JsonStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            _lock: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Load the store at `path`, creating parent directories.  A missing
    /// file is an empty store; an unreadable one is an error.
    ///
    /// Fails with [`Error::Store`] while another store (in this or any
    /// other process) has the same file open.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(Error::Io)?;
        }

        let lock_file = lock_path(path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(&lock_file)
            .map_err(Error::Io)?;
        lock.try_lock_exclusive().map_err(|_| {
            Error::Store(format!(
                "{} is in use by another process (lock {} is held); stop the server first",
                path.display(),
                lock_file.display()
            ))
        })?;

        let tables = load_tables(path)?;
        tracing::info!(
            members = tables.members.len(),
            vouchers = tables.vouchers.len(),
            terminals = tables.terminals.len(),
            path = %path.display(),
            "billing store loaded"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            _lock: Some(lock),
            inner: Mutex::new(Inner {
                tables,
                snapshot: None,
            }),
        })
    }

    /// Read the document at `path` into an in-memory store without taking
    /// the lock.  Writes to the result never reach the file, so this is
    /// safe while a server owns the store.
    pub fn snapshot(path: &Path) -> Result<Self> {
        Ok(Self {
            path: None,
            _lock: None,
            inner: Mutex::new(Inner {
                tables: load_tables(path)?,
                snapshot: None,
            }),
        })
    }

    /// Persist the current tables to disk.  A no-op for in-memory stores.
    pub fn flush(&self) -> Result<()> {
        let inner = self.inner.lock();
        self.write_tables(&inner.tables)
    }

    fn write_tables(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(tables)
            .map_err(|e| Error::Other(format!("serializing store: {e}")))?;
        // Write-then-rename so a crash never leaves a truncated document.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, path).map_err(Error::Io)?;
        Ok(())
    }

    /// Apply `f` to the tables and persist unless a transaction is open.
    ///
    /// Outside a transaction the write is all or nothing: if `f` or the
    /// disk write fails, the tables are put back.  Inside one, the caller
    /// rolls back.
    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock();
        if inner.snapshot.is_some() {
            return f(&mut *inner);
        }

        let before = inner.tables.clone();
        let applied = f(&mut *inner)
            .and_then(|value| self.write_tables(&inner.tables).map(|()| value));
        if applied.is_err() {
            inner.tables = before;
        }
        applied
    }

    // ── Provisioning ─────────────────────────────────────────────────

    /// Insert or replace a member account.
    pub fn insert_member(&self, member: MemberRecord) -> Result<()> {
        self.write(|inner| {
            inner.tables.members.insert(member.id, member);
            Ok(())
        })
    }

    /// Issue a fresh voucher.  Returns the assigned record, or an error if
    /// the code already exists.
    pub fn insert_voucher(
        &self,
        code: &str,
        minutes: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<VoucherRecord> {
        self.write(|inner| {
            if inner.tables.vouchers.contains_key(code) {
                return Err(Error::Store(format!("voucher {code} already exists")));
            }
            inner.tables.next_voucher_id += 1;
            let record = VoucherRecord {
                id: inner.tables.next_voucher_id,
                code: code.to_owned(),
                remaining_minutes: minutes,
                expires_at,
                active_terminal: None,
                last_active_username: None,
            };
            inner.tables.vouchers.insert(code.to_owned(), record.clone());
            Ok(record)
        })
    }

    /// Insert or replace a terminal.  Host addresses must stay unique.
    pub fn insert_terminal(&self, terminal: TerminalRecord) -> Result<()> {
        self.write(|inner| {
            let clash = inner
                .tables
                .terminals
                .values()
                .find(|t| t.id != terminal.id && t.host_address == terminal.host_address);
            if let Some(other) = clash {
                return Err(Error::Store(format!(
                    "host {} already belongs to terminal {}",
                    terminal.host_address, other.id
                )));
            }
            inner.tables.terminals.insert(terminal.id, terminal);
            Ok(())
        })
    }
}

impl BillingStore for JsonStore {
    fn find_member_by_username(&self, username: &str) -> Result<Option<MemberRecord>> {
        let inner = self.inner.lock();
        Ok(inner
            .tables
            .members
            .values()
            .find(|m| m.username == username)
            .cloned())
    }

    fn find_voucher_by_code(&self, code: &str) -> Result<Option<VoucherRecord>> {
        Ok(self.inner.lock().tables.vouchers.get(code).cloned())
    }

    fn update_member_duration(&self, member_id: MemberId, minutes: i64) -> Result<()> {
        self.write(|inner| {
            inner.member_mut(member_id)?.remaining_minutes = minutes;
            Ok(())
        })
    }

    fn update_voucher_duration(&self, code: &str, minutes: i64) -> Result<()> {
        self.write(|inner| {
            inner.voucher_mut(code)?.remaining_minutes = minutes;
            Ok(())
        })
    }

    fn bind_voucher_to_terminal(&self, code: &str, terminal: TerminalId, username: &str) -> Result<()> {
        self.write(|inner| {
            let voucher = inner.voucher_mut(code)?;
            voucher.active_terminal = Some(terminal);
            voucher.last_active_username = Some(username.to_owned());
            Ok(())
        })
    }

    fn bind_member_to_terminal(&self, member_id: MemberId, terminal: TerminalId) -> Result<()> {
        self.write(|inner| {
            inner.member_mut(member_id)?.active_terminal = Some(terminal);
            Ok(())
        })
    }

    fn release_voucher_binding(&self, terminal: TerminalId) -> Result<()> {
        self.write(|inner| {
            for voucher in inner.tables.vouchers.values_mut() {
                if voucher.active_terminal == Some(terminal) {
                    voucher.active_terminal = None;
                }
            }
            Ok(())
        })
    }

    fn release_member_binding(&self, member_id: MemberId) -> Result<()> {
        self.write(|inner| {
            inner.member_mut(member_id)?.active_terminal = None;
            Ok(())
        })
    }

    fn delete_voucher(&self, code: &str) -> Result<()> {
        self.write(|inner| {
            inner
                .tables
                .vouchers
                .remove(code)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(format!("voucher {code}")))
        })
    }

    fn list_terminals(&self) -> Result<Vec<TerminalRecord>> {
        Ok(self.inner.lock().tables.terminals.values().cloned().collect())
    }

    fn begin_transaction(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.snapshot.is_some() {
            return Err(Error::Transaction("a transaction is already open".into()));
        }
        inner.snapshot = Some(inner.tables.clone());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.snapshot.is_none() {
            return Err(Error::Transaction("no open transaction to commit".into()));
        }
        // The snapshot survives a failed write so the caller can roll back.
        self.write_tables(&inner.tables)?;
        inner.snapshot = None;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let snapshot = inner
            .snapshot
            .take()
            .ok_or_else(|| Error::Transaction("no open transaction to roll back".into()))?;
        inner.tables = snapshot;
        Ok(())
    }

    fn prepare_for_startup(&self, now: DateTime<Utc>) -> Result<StartupReport> {
        crate::store::transaction(self, |store| {
            let mut inner = store.inner.lock();
            let tables = &mut inner.tables;
            let mut report = StartupReport::default();

            for member in tables.members.values_mut() {
                if member.active_terminal.take().is_some() {
                    report.members_released += 1;
                }
            }

            let before = tables.vouchers.len();
            tables
                .vouchers
                .retain(|_, v| v.remaining_minutes > 0 && v.expires_at > now);
            report.vouchers_deleted = before - tables.vouchers.len();

            for voucher in tables.vouchers.values_mut() {
                if voucher.active_terminal.take().is_some() {
                    report.vouchers_released += 1;
                }
            }

            Ok(report)
        })
    }
}
