//! Scenario catalog: read-mostly CRUD over lab templates

use super::{decode_error, now};
use crate::error::{RangeError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Difficulty tier, ordered from easiest to hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            _ => Err(format!("Invalid difficulty: {}", s)),
        }
    }
}

/// A reusable lab topology. The template project is duplicated for every
/// session and never run directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub template_project_id: String,
    /// Instructor who defined it
    pub created_by: String,
    pub created_at: i64,
}

/// Insert payload for [`CatalogStore::create`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub template_project_id: String,
    pub created_by: String,
}

fn row_to_scenario(row: &SqliteRow) -> Result<Scenario> {
    let difficulty: String = row.try_get("difficulty")?;
    Ok(Scenario {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        difficulty: difficulty
            .parse()
            .map_err(|e| decode_error("difficulty", e))?,
        template_project_id: row.try_get("template_project_id")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

const SCENARIO_COLUMNS: &str =
    "id, name, description, difficulty, template_project_id, created_by, created_at";

/// Scenario repository
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, scenario_id: i64) -> Result<Scenario> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM scenarios WHERE id = ?",
            SCENARIO_COLUMNS
        ))
        .bind(scenario_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_scenario(&row),
            None => Err(RangeError::ScenarioNotFound(scenario_id)),
        }
    }

    /// All scenarios, easiest first, then by name
    pub async fn list(&self) -> Result<Vec<Scenario>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scenarios ORDER BY id ASC",
            SCENARIO_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut scenarios = rows
            .iter()
            .map(row_to_scenario)
            .collect::<Result<Vec<_>>>()?;
        scenarios.sort_by(|a, b| {
            a.difficulty
                .cmp(&b.difficulty)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(scenarios)
    }

    pub async fn create(&self, new: NewScenario) -> Result<Scenario> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(RangeError::InvalidInput(
                "Scenario name is required".to_string(),
            ));
        }
        if new.template_project_id.trim().is_empty() {
            return Err(RangeError::InvalidInput(
                "Scenario needs a template project".to_string(),
            ));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO scenarios (name, description, difficulty, template_project_id, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            SCENARIO_COLUMNS
        ))
        .bind(name)
        .bind(new.description.trim())
        .bind(new.difficulty.as_str())
        .bind(new.template_project_id.trim())
        .bind(&new.created_by)
        .bind(now())
        .fetch_one(&self.pool)
        .await?;

        let scenario = row_to_scenario(&row)?;
        tracing::info!(
            "Defined scenario {} '{}' ({}) on template {}",
            scenario.id,
            scenario.name,
            scenario.difficulty,
            scenario.template_project_id
        );
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_ordering() {
        assert!(Difficulty::Beginner < Difficulty::Intermediate);
        assert!(Difficulty::Intermediate < Difficulty::Advanced);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("Beginner".parse::<Difficulty>(), Ok(Difficulty::Beginner));
        assert_eq!(" advanced ".parse::<Difficulty>(), Ok(Difficulty::Advanced));
        assert!("expert".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Intermediate.to_string(), "intermediate");
    }
}
