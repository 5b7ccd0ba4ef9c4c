use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::identity::Claims;
use crate::users::repository::{NewUser, UserRepository};

const ADJECTIVES: &[&str] = &[
    "amber", "brave", "calm", "clever", "cosmic", "crimson", "daring", "eager", "gentle",
    "golden", "hidden", "jolly", "lucky", "mellow", "nimble", "quiet", "rapid", "silent",
    "swift", "vivid",
];

const NOUNS: &[&str] = &[
    "badger", "comet", "falcon", "forest", "glacier", "harbor", "lantern", "meadow", "otter",
    "panda", "phoenix", "pine", "raven", "river", "summit", "tiger", "voyager", "willow",
    "wolf", "zephyr",
];

const USERNAME_ATTEMPTS: usize = 10;

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub message: String,
}

pub enum SigninOutcome {
    Existing,
    Created,
}

/// `adjective_noun_NNN`, NNN in 100..=999.
pub fn random_username<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(rng).copied().unwrap_or("otter");
    format!("{adjective}_{noun}_{}", rng.gen_range(100..=999))
}

async fn unique_username(users: &dyn UserRepository) -> Result<String, AppError> {
    for _ in 0..USERNAME_ATTEMPTS {
        let candidate = random_username(&mut rand::thread_rng());
        if users.find_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict(
        "Could not allocate a unique username, please retry".into(),
    ))
}

/// Creates the user described by verified token claims.
pub async fn signup(
    users: &dyn UserRepository,
    claims: &Claims,
) -> Result<SignupResponse, AppError> {
    if users.find_by_uid(&claims.uid).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }
    let email = claims
        .email
        .clone()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Token does not carry an email address".into()))?;

    let username = unique_username(users).await?;
    let user = users
        .create(NewUser {
            uid: claims.uid.clone(),
            username,
            email,
            full_name: claims.name.clone(),
            img: claims.picture.clone(),
        })
        .await?;
    info!("Created user {} ({})", user.username, user.uid);

    Ok(SignupResponse {
        username: user.username,
        message: "User created successfully".into(),
    })
}

/// Signs in an existing user, registering them first if needed.
pub async fn signin(
    users: &dyn UserRepository,
    claims: &Claims,
) -> Result<SigninOutcome, AppError> {
    if users.find_by_uid(&claims.uid).await?.is_some() {
        return Ok(SigninOutcome::Existing);
    }
    signup(users, claims).await?;
    Ok(SigninOutcome::Created)
}
