use crate::domain::models::{Celebration, EncouragementMessage, Quote};
use std::sync::atomic::{AtomicUsize, Ordering};

const CELEBRATION_TITLE: &str = "All focus tasks done!";

const ENCOURAGEMENTS: &[(&str, &str)] = &[
    (
        "Today's three big things are planned.",
        "Give yourself some applause and keep the rhythm tomorrow.",
    ),
    (
        "Today's focus list is full.",
        "Recharge well and start fresh tomorrow.",
    ),
    (
        "Task quota reached. Stay focused!",
        "Save some energy for tomorrow. You are on the right path.",
    ),
];

const QUOTES: &[(&str, &str)] = &[
    ("Stay hungry, stay foolish.", "Steve Jobs"),
    ("The future depends on what you do today.", "Mahatma Gandhi"),
    ("Well done is better than well said.", "Benjamin Franklin"),
    ("Focus on being productive instead of busy.", "Tim Ferriss"),
    ("Either you run the day or the day runs you.", "Jim Rohn"),
];

pub trait EncouragementProvider: Send + Sync {
    fn next_message(&self) -> EncouragementMessage;
}

pub trait CelebrationProvider: Send + Sync {
    fn next_celebration(&self) -> Celebration;
}

/// Cycles through the built-in limit-reached messages.
#[derive(Debug, Default)]
pub struct RotatingEncouragement {
    cursor: AtomicUsize,
}

impl EncouragementProvider for RotatingEncouragement {
    fn next_message(&self) -> EncouragementMessage {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % ENCOURAGEMENTS.len();
        let (message, encouragement) = ENCOURAGEMENTS[index];
        EncouragementMessage {
            message: message.to_string(),
            encouragement: encouragement.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RotatingCelebration {
    cursor: AtomicUsize,
}

impl CelebrationProvider for RotatingCelebration {
    fn next_celebration(&self) -> Celebration {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % QUOTES.len();
        let (text, author) = QUOTES[index];
        Celebration {
            id: uuid::Uuid::new_v4().to_string(),
            title: CELEBRATION_TITLE.to_string(),
            quote: Quote {
                text: text.to_string(),
                author: author.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encouragement_rotates_and_wraps() {
        let provider = RotatingEncouragement::default();
        let messages = (0..ENCOURAGEMENTS.len() + 1)
            .map(|_| provider.next_message())
            .collect::<Vec<_>>();

        assert_ne!(messages[0], messages[1]);
        assert_eq!(messages[0], messages[ENCOURAGEMENTS.len()]);
    }

    #[test]
    fn celebrations_get_fresh_ids() {
        let provider = RotatingCelebration::default();
        let first = provider.next_celebration();
        let second = provider.next_celebration();

        assert_eq!(first.title, CELEBRATION_TITLE);
        assert_ne!(first.id, second.id);
        assert_ne!(first.quote, second.quote);
    }
}
