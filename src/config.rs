use serde::Serialize;

use crate::error::AppError;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub academy: AcademyProfile,
}

/// Contact details printed in the footer of outgoing notices.
#[derive(Debug, Clone, Serialize)]
pub struct AcademyProfile {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl Default for AcademyProfile {
    fn default() -> Self {
        Self {
            name: "GearMinds Academy".to_string(),
            phone: "(469) 290-4561".to_string(),
            email: "contactus@gearmindsacademy.com".to_string(),
            address: "11511 Independence Pkwy, Suite #101, Frisco, TX 75035".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        // a missing .env file is fine, the variables may come from the shell
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| AppError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value.parse::<u32>().map_err(|e| AppError::InvalidEnvValue {
                var: "DATABASE_MAX_CONNECTIONS".to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => 5,
        };

        let defaults = AcademyProfile::default();
        let academy = AcademyProfile {
            name: env_or("ACADEMY_NAME", defaults.name),
            phone: env_or("ACADEMY_PHONE", defaults.phone),
            email: env_or("ACADEMY_EMAIL", defaults.email),
            address: env_or("ACADEMY_ADDRESS", defaults.address),
        };

        Ok(Self {
            database_url,
            max_connections,
            academy,
        })
    }
}

fn env_or(var: &str, fallback: String) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(fallback)
}
