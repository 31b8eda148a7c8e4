use rand::seq::SliceRandom;

use crate::domain::models::event::{Assignment, Participant};
use crate::error::AppError;

/// Shuffles the participants and closes them into a single cycle: everyone
/// gives to the next person in the shuffled order, the last to the first.
pub fn generate_assignments(participants: &[Participant]) -> Result<Vec<Assignment>, AppError> {
    if participants.len() < 2 {
        return Err(AppError::Validation(
            "at least 2 participants are required for a drawing".to_string(),
        ));
    }

    let mut shuffled: Vec<&Participant> = participants.iter().collect();
    shuffled.shuffle(&mut rand::thread_rng());

    let n = shuffled.len();
    let assignments = (0..n)
        .map(|i| {
            let giver = shuffled[i];
            let receiver = shuffled[(i + 1) % n];
            Assignment {
                from: giver.user_id.clone(),
                from_name: giver.display_name.clone(),
                to: receiver.user_id.clone(),
                to_name: receiver.display_name.clone(),
            }
        })
        .collect();

    Ok(assignments)
}
