//! The user directory engine.
//!
//! Owns the `regions`, `stts` and `users` tables and enforces the rules
//! around them.

use std::collections::BTreeMap;

use tracing::{debug, info};
use uuid::Uuid;

use tdp_storage::{SqlParam, StorageBackend};
use tdp_storage_sqlite::{SqliteBackend, SqliteTransaction};

use crate::profile::ProfileUpdate;
use crate::{
    FieldErrors, NewUser, Region, RegionSummary, Role, Stt, SttSummary, SttType, User, UsersError,
};

/// SQL schema for the directory tables.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS regions (
    id          INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS stts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    type        TEXT NOT NULL,
    code        TEXT,
    name        TEXT NOT NULL,
    state_id    INTEGER REFERENCES stts(id),
    region_id   INTEGER NOT NULL REFERENCES regions(id)
);

CREATE INDEX IF NOT EXISTS idx_stts_region ON stts(region_id);

CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    email           TEXT NOT NULL DEFAULT '',
    password_hash   TEXT,
    first_name      TEXT NOT NULL DEFAULT '',
    last_name       TEXT NOT NULL DEFAULT '',
    role            TEXT,
    requested_role  TEXT,
    stt_id          INTEGER REFERENCES stts(id),
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL
);
"#;

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
                            role, requested_role, stt_id, created_at, updated_at";

const STT_COLUMNS: &str = "id, type, code, name, state_id, region_id";

const INSERT_REGION: &str = "INSERT INTO regions (id) VALUES (?)";

const INSERT_STT: &str = "INSERT INTO stts (id, type, code, name, state_id, region_id) \
                          VALUES (?, ?, ?, ?, ?, ?) RETURNING id";

/// Write-once columns are only written while still empty.
const UPDATE_PROFILE: &str = "UPDATE users SET \
        first_name = COALESCE(?, first_name), \
        last_name = COALESCE(?, last_name), \
        requested_role = COALESCE(?, requested_role), \
        stt_id = COALESCE(?, stt_id), \
        updated_at = ? \
    WHERE id = ? \
        AND (? IS NULL OR (requested_role IS NULL AND role IS NULL)) \
        AND (? IS NULL OR stt_id IS NULL)";

/// Maximum username length.
const MAX_USERNAME_LEN: usize = 150;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: Option<String>,
    first_name: String,
    last_name: String,
    role: Option<String>,
    requested_role: Option<String>,
    stt_id: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = UsersError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let parse_role = |raw: Option<String>| -> Result<Option<Role>, UsersError> {
            raw.map(|r| {
                r.parse::<Role>()
                    .map_err(|_| UsersError::Storage(format!("unknown stored role: {r}")))
            })
            .transpose()
        };

        Ok(User {
            id: Uuid::parse_str(&row.id)
                .map_err(|e| UsersError::Storage(format!("invalid user id: {e}")))?,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role: parse_role(row.role)?,
            requested_role: parse_role(row.requested_role)?,
            stt_id: row.stt_id,
            created_at: row.created_at.max(0) as u64,
            updated_at: row.updated_at.max(0) as u64,
        })
    }
}

type SttRow = (i64, String, Option<String>, String, Option<i64>, i64);

fn stt_from_row(row: SttRow) -> Result<Stt, UsersError> {
    let (id, stt_type, code, name, state_id, region_id) = row;
    Ok(Stt {
        id,
        stt_type: stt_type.parse()?,
        code,
        name,
        state_id,
        region_id,
    })
}

/// STT input for population.
#[derive(Debug, Clone)]
pub struct NewStt {
    /// Explicit id; assigned by the database when absent.
    pub id: Option<i64>,
    /// Kind of STT.
    pub stt_type: SttType,
    /// Postal code.
    pub code: Option<String>,
    /// Display name.
    pub name: String,
    /// Parent state for tribes.
    pub state_id: Option<i64>,
    /// Region the STT belongs to.
    pub region_id: i64,
}

/// The user directory provides storage and rules for users and STTs.
#[derive(Clone)]
pub struct UserDirectory {
    storage: SqliteBackend,
}

impl UserDirectory {
    /// Creates the directory on top of an opened backend, creating tables
    /// as needed.
    pub async fn new(storage: SqliteBackend) -> Result<Self, UsersError> {
        let directory = Self { storage };
        directory.init_schema().await?;

        info!(path = %directory.storage.path().display(), "User directory initialized");
        Ok(directory)
    }

    /// Initializes the database schema.
    async fn init_schema(&self) -> Result<(), UsersError> {
        self.storage.execute_raw(SCHEMA).await?;
        Ok(())
    }

    /// The underlying storage backend.
    pub fn storage(&self) -> &SqliteBackend {
        &self.storage
    }

    /// Returns the current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Creates a user.
    ///
    /// The password, when given, is stored as an Argon2id hash.
    pub async fn create_user(&self, new: NewUser) -> Result<User, UsersError> {
        let mut errors = FieldErrors::new();
        let username = new.username.trim().to_string();
        if username.is_empty() {
            errors.add("username", "This field may not be blank.");
        } else if username.len() > MAX_USERNAME_LEN {
            errors.add(
                "username",
                format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters."),
            );
        }
        if matches!(new.password.as_deref(), Some("")) {
            errors.add("password", "This field may not be blank.");
        }
        errors.into_result()?;

        if self.find_by_username(&username).await?.is_some() {
            return Err(UsersError::AlreadyExists(username));
        }

        let password_hash = new
            .password
            .as_deref()
            .map(tdp_crypto::password::hash_password)
            .transpose()?;

        let id = new.id.unwrap_or_else(Uuid::new_v4);
        let now = Self::now();

        self.storage
            .execute(
                "INSERT INTO users (id, username, email, password_hash, first_name, last_name, role, requested_role, stt_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)",
                &[
                    id.to_string().into(),
                    username.as_str().into(),
                    new.email.into(),
                    password_hash.into(),
                    new.first_name.into(),
                    new.last_name.into(),
                    new.role.map(|r| r.as_str()).into(),
                    new.stt_id.into(),
                    now.into(),
                    now.into(),
                ],
            )
            .await?;

        debug!(user_id = %id, username = %username, "User created");

        self.get_user(id)
            .await?
            .ok_or_else(|| UsersError::NotFound(format!("user {id}")))
    }

    /// Looks up a user by id.
    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, UsersError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        self.storage
            .query_one::<UserRow>(&sql, &[id.to_string().into()])
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Looks up a user by username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, UsersError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        self.storage
            .query_one::<UserRow>(&sql, &[username.into()])
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Lists all users ordered by username.
    pub async fn list_users(&self) -> Result<Vec<User>, UsersError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        self.storage
            .query_all::<UserRow>(&sql, &[])
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Number of users.
    pub async fn count_users(&self) -> Result<u64, UsersError> {
        self.count("SELECT COUNT(*) FROM users").await
    }

    /// Updates a user's names. `None` leaves a name unchanged.
    pub async fn update_names(
        &self,
        id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User, UsersError> {
        let user = self
            .get_user(id)
            .await?
            .ok_or_else(|| UsersError::NotFound(format!("user {id}")))?;

        self.storage
            .execute(
                "UPDATE users SET first_name = ?, last_name = ?, updated_at = ? WHERE id = ?",
                &[
                    first_name.unwrap_or(user.first_name).into(),
                    last_name.unwrap_or(user.last_name).into(),
                    Self::now().into(),
                    id.to_string().into(),
                ],
            )
            .await?;

        self.get_user(id)
            .await?
            .ok_or_else(|| UsersError::NotFound(format!("user {id}")))
    }

    /// Applies a self-service profile update.
    ///
    /// `requested_role` and `stt` can each be set only once; see
    /// [`ProfileUpdate::validate`]. The write re-checks both columns; losing
    /// to a concurrent update yields the same field errors.
    pub async fn set_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User, UsersError> {
        let user = self
            .get_user(id)
            .await?
            .ok_or_else(|| UsersError::NotFound(format!("user {id}")))?;

        let stt_exists = match update.stt {
            Some(stt_id) => self.get_stt(stt_id).await?.is_some(),
            None => false,
        };

        let profile = update.validate(&user, stt_exists)?;
        let requested_role: SqlParam = profile.requested_role.map(|r| r.as_str()).into();
        let stt_id: SqlParam = profile.stt_id.into();

        let updated = self
            .storage
            .execute(
                UPDATE_PROFILE,
                &[
                    profile.first_name.into(),
                    profile.last_name.into(),
                    requested_role.clone(),
                    stt_id.clone(),
                    Self::now().into(),
                    id.to_string().into(),
                    requested_role,
                    stt_id,
                ],
            )
            .await?;

        if updated == 0 {
            let current = self
                .get_user(id)
                .await?
                .ok_or_else(|| UsersError::NotFound(format!("user {id}")))?;
            update.validate(&current, stt_exists)?;
            return Err(UsersError::Storage(format!("profile of user {id} was not updated")));
        }

        info!(user_id = %id, "Profile updated");

        self.get_user(id)
            .await?
            .ok_or_else(|| UsersError::NotFound(format!("user {id}")))
    }

    // ------------------------------------------------------------------
    // Regions and STTs
    // ------------------------------------------------------------------

    /// Starts a batch of region and STT writes that commit together.
    pub async fn begin_stt_batch(&self) -> Result<SttBatch, UsersError> {
        Ok(SttBatch {
            tx: self.storage.begin().await?,
        })
    }

    /// Inserts a region.
    pub async fn insert_region(&self, region: Region) -> Result<(), UsersError> {
        let mut batch = self.begin_stt_batch().await?;
        batch.insert_region(region).await?;
        batch.commit().await
    }

    /// Inserts an STT and returns its id.
    pub async fn insert_stt(&self, stt: NewStt) -> Result<i64, UsersError> {
        let mut batch = self.begin_stt_batch().await?;
        let id = batch.insert_stt(stt).await?;
        batch.commit().await?;
        Ok(id)
    }

    /// Looks up an STT by id.
    pub async fn get_stt(&self, id: i64) -> Result<Option<Stt>, UsersError> {
        let sql = format!("SELECT {STT_COLUMNS} FROM stts WHERE id = ?");
        self.storage
            .query_one::<SttRow>(&sql, &[id.into()])
            .await?
            .map(stt_from_row)
            .transpose()
    }

    /// Looks up a state by its postal code.
    pub async fn find_state_by_code(&self, code: &str) -> Result<Option<Stt>, UsersError> {
        let sql = format!("SELECT {STT_COLUMNS} FROM stts WHERE code = ? AND type = 'state'");
        self.storage
            .query_one::<SttRow>(&sql, &[code.into()])
            .await?
            .map(stt_from_row)
            .transpose()
    }

    /// Picks a random STT, if any exist.
    pub async fn random_stt(&self) -> Result<Option<Stt>, UsersError> {
        let sql = format!("SELECT {STT_COLUMNS} FROM stts ORDER BY RANDOM() LIMIT 1");
        self.storage
            .query_one::<SttRow>(&sql, &[])
            .await?
            .map(stt_from_row)
            .transpose()
    }

    /// Lists every STT ordered by region, then name.
    pub async fn list_stts(&self) -> Result<Vec<Stt>, UsersError> {
        let sql = format!("SELECT {STT_COLUMNS} FROM stts ORDER BY region_id, name");
        self.storage
            .query_all::<SttRow>(&sql, &[])
            .await?
            .into_iter()
            .map(stt_from_row)
            .collect()
    }

    /// Lists regions ordered by id, each with its STTs ordered by name.
    ///
    /// Tribes report their parent state's code.
    pub async fn regions_with_stts(&self) -> Result<Vec<RegionSummary>, UsersError> {
        let regions: Vec<(i64,)> = self
            .storage
            .query_all("SELECT id FROM regions ORDER BY id", &[])
            .await?;

        let stts = self.list_stts().await?;
        let codes: BTreeMap<i64, Option<String>> =
            stts.iter().map(|s| (s.id, s.code.clone())).collect();

        let mut by_region: BTreeMap<i64, Vec<SttSummary>> = BTreeMap::new();
        for stt in stts {
            let code = match stt.stt_type {
                SttType::Tribe => stt
                    .state_id
                    .and_then(|state| codes.get(&state).cloned().flatten()),
                _ => stt.code,
            };
            by_region.entry(stt.region_id).or_default().push(SttSummary {
                id: stt.id,
                stt_type: stt.stt_type,
                code,
                name: stt.name,
            });
        }

        Ok(regions
            .into_iter()
            .map(|(id,)| RegionSummary {
                id,
                stts: by_region.remove(&id).unwrap_or_default(),
            })
            .collect())
    }

    /// Number of regions.
    pub async fn count_regions(&self) -> Result<u64, UsersError> {
        self.count("SELECT COUNT(*) FROM regions").await
    }

    /// Number of STTs.
    pub async fn count_stts(&self) -> Result<u64, UsersError> {
        self.count("SELECT COUNT(*) FROM stts").await
    }

    async fn count(&self, sql: &str) -> Result<u64, UsersError> {
        let (count,): (i64,) = self
            .storage
            .query_one(sql, &[])
            .await?
            .unwrap_or((0,));
        Ok(count.max(0) as u64)
    }
}

/// Region and STT writes inside one transaction.
///
/// Dropping the batch without [`SttBatch::commit`] discards every write.
pub struct SttBatch {
    tx: SqliteTransaction,
}

impl SttBatch {
    /// Number of regions plus STTs visible to the batch.
    pub async fn count_regions_and_stts(&mut self) -> Result<u64, UsersError> {
        let (count,): (i64,) = self
            .tx
            .query_one(
                "SELECT (SELECT COUNT(*) FROM regions) + (SELECT COUNT(*) FROM stts)",
                &[],
            )
            .await?
            .unwrap_or((0,));
        Ok(count.max(0) as u64)
    }

    /// Inserts a region.
    pub async fn insert_region(&mut self, region: Region) -> Result<(), UsersError> {
        self.tx.execute(INSERT_REGION, &[region.id.into()]).await?;
        Ok(())
    }

    /// Inserts an STT and returns its id.
    pub async fn insert_stt(&mut self, stt: NewStt) -> Result<i64, UsersError> {
        let params: Vec<SqlParam> = vec![
            stt.id.into(),
            stt.stt_type.as_str().into(),
            stt.code.into(),
            stt.name.as_str().into(),
            stt.state_id.into(),
            stt.region_id.into(),
        ];

        let (id,): (i64,) = self
            .tx
            .query_one(INSERT_STT, &params)
            .await?
            .ok_or_else(|| UsersError::Storage("missing inserted STT id".into()))?;

        Ok(id)
    }

    /// Looks up a state by postal code, including states written by this batch.
    pub async fn find_state_by_code(&mut self, code: &str) -> Result<Option<Stt>, UsersError> {
        let sql = format!("SELECT {STT_COLUMNS} FROM stts WHERE code = ? AND type = 'state'");
        self.tx
            .query_one::<SttRow>(&sql, &[code.into()])
            .await?
            .map(stt_from_row)
            .transpose()
    }

    /// Commits every write in the batch.
    pub async fn commit(self) -> Result<(), UsersError> {
        self.tx.commit().await?;
        Ok(())
    }
}
