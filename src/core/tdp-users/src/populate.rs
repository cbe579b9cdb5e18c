//! Population commands: bundled STT data and per-role test users.

use std::collections::HashMap;

use fake::faker::internet::en::Password;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use tracing::{debug, info};

use crate::directory::NewStt;
use crate::{NewUser, Region, Role, SttType, UserDirectory, UsersError};

/// Source tables for STT population.
struct SttTables<'a> {
    regions: &'a str,
    states: &'a str,
    territories: &'a str,
    tribes: &'a str,
}

const BUNDLED: SttTables<'static> = SttTables {
    regions: include_str!("../data/regions.csv"),
    states: include_str!("../data/states.csv"),
    territories: include_str!("../data/territories.csv"),
    tribes: include_str!("../data/tribes.csv"),
};

/// Id of the STT standing for the Office of Family Assistance itself.
pub const OFA_STT_ID: i64 = -1;
/// Region holding the OFA entry.
pub const OFA_REGION_ID: i64 = 1000;
/// Display name of the OFA entry.
pub const OFA_STT_NAME: &str = "I work at OFA";

/// Counts of records written by [`populate_stts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationSummary {
    /// Regions inserted.
    pub regions: usize,
    /// States and territories inserted (including the OFA entry).
    pub states_and_territories: usize,
    /// Tribes inserted.
    pub tribes: usize,
}

/// Users written by [`generate_test_users`].
#[derive(Debug, Clone)]
pub struct GeneratedUsers {
    /// Usernames created in this run.
    pub created: Vec<String>,
    /// Password shared by the created users.
    pub password: String,
}

/// Parses a small comma-separated table with a header row.
///
/// Values are trimmed. The bundled tables never quote fields or embed
/// commas in them, so a quote anywhere is rejected rather than misread.
fn parse_table(name: &str, text: &str) -> Result<Vec<HashMap<String, String>>, UsersError> {
    if let Some(line) = text.lines().position(|l| l.contains('"')) {
        return Err(UsersError::Data(format!(
            "{name}: row {} uses quoting, which is not supported",
            line + 1
        )));
    }

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = lines
        .next()
        .ok_or_else(|| UsersError::Data(format!("{name}: missing header")))?
        .split(',')
        .map(|h| h.trim().to_string())
        .collect();

    lines
        .enumerate()
        .map(|(i, line)| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            if values.len() != header.len() {
                return Err(UsersError::Data(format!(
                    "{name}: row {} has {} fields, expected {}",
                    i + 2,
                    values.len(),
                    header.len()
                )));
            }
            Ok(header
                .iter()
                .cloned()
                .zip(values.into_iter().map(str::to_string))
                .collect())
        })
        .collect()
}

fn field<'a>(row: &'a HashMap<String, String>, name: &str) -> Result<&'a str, UsersError> {
    row.get(name)
        .map(String::as_str)
        .ok_or_else(|| UsersError::Data(format!("missing column {name}")))
}

fn region_of(row: &HashMap<String, String>) -> Result<i64, UsersError> {
    let raw = field(row, "Region")?;
    raw.parse()
        .map_err(|_| UsersError::Data(format!("invalid region: {raw}")))
}

fn coded_stts(name: &str, text: &str, stt_type: SttType) -> Result<Vec<NewStt>, UsersError> {
    parse_table(name, text)?
        .iter()
        .map(|row| {
            Ok(NewStt {
                id: None,
                stt_type,
                code: Some(field(row, "Code")?.to_string()),
                name: field(row, "Name")?.to_string(),
                state_id: None,
                region_id: region_of(row)?,
            })
        })
        .collect()
}

/// Populates regions, states, territories and tribes.
///
/// Refuses to run unless both the region and STT tables are empty, so a
/// second run never duplicates records. All writes share one transaction:
/// a failure leaves the tables empty.
pub async fn populate_stts(directory: &UserDirectory) -> Result<PopulationSummary, UsersError> {
    populate_from(directory, &BUNDLED).await
}

async fn populate_from(
    directory: &UserDirectory,
    tables: &SttTables<'_>,
) -> Result<PopulationSummary, UsersError> {
    let regions = parse_table("regions.csv", tables.regions)?;
    let mut stts = coded_stts("states.csv", tables.states, SttType::State)?;
    stts.extend(coded_stts(
        "territories.csv",
        tables.territories,
        SttType::Territory,
    )?);
    stts.push(NewStt {
        id: Some(OFA_STT_ID),
        stt_type: SttType::State,
        code: Some("US".into()),
        name: OFA_STT_NAME.into(),
        state_id: None,
        region_id: OFA_REGION_ID,
    });
    let tribe_rows = parse_table("tribes.csv", tables.tribes)?;

    let mut batch = directory.begin_stt_batch().await?;
    if batch.count_regions_and_stts().await? > 0 {
        return Err(UsersError::NotEmpty);
    }

    for row in &regions {
        let raw = field(row, "Id")?;
        let id = raw
            .parse()
            .map_err(|_| UsersError::Data(format!("invalid region id: {raw}")))?;
        batch.insert_region(Region { id }).await?;
    }

    let states_and_territories = stts.len();
    for stt in stts {
        batch.insert_stt(stt).await?;
    }

    for row in &tribe_rows {
        let code = field(row, "Code")?;
        let state = batch
            .find_state_by_code(code)
            .await?
            .ok_or_else(|| UsersError::Data(format!("tribe references unknown state {code}")))?;

        batch
            .insert_stt(NewStt {
                id: None,
                stt_type: SttType::Tribe,
                code: None,
                name: field(row, "Name")?.to_string(),
                state_id: Some(state.id),
                region_id: region_of(row)?,
            })
            .await?;
    }

    batch.commit().await?;

    let summary = PopulationSummary {
        regions: regions.len(),
        states_and_territories,
        tribes: tribe_rows.len(),
    };
    info!(?summary, "STTs populated");
    Ok(summary)
}

/// Username of the test user for a role, or the unassigned user.
pub fn test_username(role: Option<Role>) -> String {
    match role {
        Some(role) => format!("test__{}", role.as_str().replace(' ', "_").to_lowercase()),
        None => "test__unassigned".to_string(),
    }
}

/// Creates one test user per role plus an unassigned one.
///
/// Users that already exist are skipped. OFA analysts are attached to the
/// OFA entry; everyone else gets a random STT.
pub async fn generate_test_users(directory: &UserDirectory) -> Result<GeneratedUsers, UsersError> {
    let password: String = Password(12..20).fake();

    let ofa = directory
        .get_stt(OFA_STT_ID)
        .await?
        .ok_or_else(|| UsersError::NotFound("OFA STT; run populate-stts first".into()))?;

    let roles = Role::ALL.into_iter().map(Some).chain(std::iter::once(None));

    let mut created = Vec::new();
    for role in roles {
        let stt = if role == Some(Role::OfaAnalyst) {
            Some(ofa.clone())
        } else {
            directory.random_stt().await?
        };

        let username = test_username(role);
        let result = directory
            .create_user(NewUser {
                id: None,
                username: username.clone(),
                email: "test@example.com".into(),
                password: Some(password.clone()),
                first_name: FirstName().fake(),
                last_name: LastName().fake(),
                role,
                stt_id: stt.map(|s| s.id),
            })
            .await;

        match result {
            Ok(user) => created.push(user.username),
            Err(UsersError::AlreadyExists(_)) => {
                debug!(username = %username, "Test user already exists");
            },
            Err(e) => return Err(e),
        }
    }

    info!(count = created.len(), "Test users generated");
    Ok(GeneratedUsers { created, password })
}
