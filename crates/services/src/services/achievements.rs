use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::collection::{CollectionError, CollectionService, CollectionStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum AchievementMetric {
    Owned,
    Wishlist,
    Completed,
    DistinctGenres,
    Physical,
    Digital,
}

impl AchievementMetric {
    fn read(self, stats: &CollectionStats) -> usize {
        match self {
            Self::Owned => stats.owned,
            Self::Wishlist => stats.wishlist,
            Self::Completed => stats.completed,
            Self::DistinctGenres => stats.distinct_genres,
            Self::Physical => stats.physical,
            Self::Digital => stats.digital,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub metric: AchievementMetric,
    pub target: usize,
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first_game",
        name: "First Cartridge",
        description: "Add your first owned game",
        metric: AchievementMetric::Owned,
        target: 1,
    },
    Achievement {
        id: "collector",
        name: "Collector",
        description: "Own 10 games",
        metric: AchievementMetric::Owned,
        target: 10,
    },
    Achievement {
        id: "curator",
        name: "Curator",
        description: "Own 50 games",
        metric: AchievementMetric::Owned,
        target: 50,
    },
    Achievement {
        id: "dreamer",
        name: "Dreamer",
        description: "Put 5 games on your wishlist",
        metric: AchievementMetric::Wishlist,
        target: 5,
    },
    Achievement {
        id: "finisher",
        name: "Finisher",
        description: "Complete a game",
        metric: AchievementMetric::Completed,
        target: 1,
    },
    Achievement {
        id: "completionist",
        name: "Completionist",
        description: "Complete 10 games",
        metric: AchievementMetric::Completed,
        target: 10,
    },
    Achievement {
        id: "genre_explorer",
        name: "Genre Explorer",
        description: "Own games from 5 different genres",
        metric: AchievementMetric::DistinctGenres,
        target: 5,
    },
    Achievement {
        id: "physical_media",
        name: "Physical Media",
        description: "Own 5 physical cartridges",
        metric: AchievementMetric::Physical,
        target: 5,
    },
    Achievement {
        id: "digital_native",
        name: "Digital Native",
        description: "Own 5 digital games",
        metric: AchievementMetric::Digital,
        target: 5,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AchievementProgress {
    pub id: String,
    pub name: String,
    pub description: String,
    pub metric: AchievementMetric,
    pub current: usize,
    pub target: usize,
    pub percent: u8,
    pub unlocked: bool,
}

impl AchievementProgress {
    fn measure(achievement: &Achievement, stats: &CollectionStats) -> Self {
        let target = achievement.target.max(1);
        let current = achievement.metric.read(stats).min(target);
        // current <= target so this stays within 0..=100
        let percent = (current * 100 / target) as u8;
        Self {
            id: achievement.id.to_string(),
            name: achievement.name.to_string(),
            description: achievement.description.to_string(),
            metric: achievement.metric,
            current,
            target,
            percent,
            unlocked: current >= target,
        }
    }
}

pub fn evaluate(stats: &CollectionStats) -> Vec<AchievementProgress> {
    ACHIEVEMENTS
        .iter()
        .map(|a| AchievementProgress::measure(a, stats))
        .collect()
}

#[derive(Clone)]
pub struct AchievementService {
    collection: CollectionService,
}

impl AchievementService {
    pub fn new(collection: CollectionService) -> Self {
        Self { collection }
    }

    pub async fn progress(&self, user_id: Uuid) -> Result<Vec<AchievementProgress>, CollectionError> {
        let stats = self.collection.stats(user_id).await?;
        Ok(evaluate(&stats))
    }
}
