//! Seed data: the built-in badge catalog and eco challenge catalog used when the
//! TOML config does not provide its own.

use std::collections::BTreeMap;

use crate::domain::{
  BadgeCategory, BadgeDefinition, EcoChallenge, Impact, Rarity, Requirement, RequirementKind,
  RequirementValue,
};

#[allow(clippy::too_many_arguments)]
fn badge(
  id: &str,
  name: &str,
  description: &str,
  category: BadgeCategory,
  icon: &str,
  color: &str,
  rarity: Rarity,
  points_reward: u32,
  order: i32,
  requirement: Requirement,
) -> BadgeDefinition {
  BadgeDefinition {
    id: id.into(),
    name: name.into(),
    description: description.into(),
    category,
    icon: icon.into(),
    color: color.into(),
    rarity,
    points_reward,
    order,
    is_active: true,
    requirement,
  }
}

fn threshold(kind: RequirementKind, value: f64) -> Requirement {
  Requirement { kind, value: RequirementValue::Threshold(value), subject: None, difficulty: None }
}

fn subject_count(subject: &str, value: f64) -> Requirement {
  Requirement { subject: Some(subject.into()), ..threshold(RequirementKind::Count, value) }
}

fn difficulty_count(difficulty: &str, value: f64) -> Requirement {
  Requirement { difficulty: Some(difficulty.into()), ..threshold(RequirementKind::Count, value) }
}

fn combination(pairs: &[(&str, f64)]) -> Requirement {
  let clauses: BTreeMap<String, f64> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
  Requirement {
    kind: RequirementKind::Combination,
    value: RequirementValue::Clauses(clauses),
    subject: None,
    difficulty: None,
  }
}

/// Default badge catalog, in evaluation order.
pub fn seed_badges() -> Vec<BadgeDefinition> {
  use BadgeCategory::{Achievement, Challenge, Quiz, Special};
  use RequirementKind::{Count, Points, Score, Streak};
  vec![
    badge("quiz-beginner", "Quiz Beginner", "Complete your first quiz", Quiz, "📝", "#10B981", Rarity::Common, 10, 1, threshold(Count, 1.0)),
    badge("quiz-master", "Quiz Master", "Complete 10 quizzes", Quiz, "🏆", "#F59E0B", Rarity::Rare, 50, 2, threshold(Count, 10.0)),
    badge("quiz-champion", "Quiz Champion", "Complete 50 quizzes", Quiz, "👑", "#8B5CF6", Rarity::Epic, 100, 3, threshold(Count, 50.0)),
    badge("perfect-score", "Perfect Score", "Keep a 100% average score", Quiz, "⭐", "#EF4444", Rarity::Rare, 25, 4, threshold(Score, 100.0)),
    badge("advanced-learner", "Advanced Learner", "Complete 5 advanced level quizzes", Quiz, "🚀", "#7C3AED", Rarity::Epic, 75, 5, difficulty_count("advanced", 5.0)),
    badge("week-warrior", "Week Warrior", "Maintain a 7-day learning streak", BadgeCategory::Streak, "🔥", "#F97316", Rarity::Rare, 30, 6, threshold(Streak, 7.0)),
    badge("month-master", "Month Master", "Maintain a 30-day learning streak", BadgeCategory::Streak, "💪", "#DC2626", Rarity::Legendary, 100, 7, threshold(Streak, 30.0)),
    badge("bronze-achiever", "Bronze Achiever", "Earn 100 points", Achievement, "🥉", "#CD7F32", Rarity::Common, 0, 8, threshold(Points, 100.0)),
    badge("silver-star", "Silver Star", "Earn 500 points", Achievement, "🥈", "#C0C0C0", Rarity::Rare, 0, 9, threshold(Points, 500.0)),
    badge("gold-elite", "Gold Elite", "Earn 1000 points", Achievement, "🥇", "#FFD700", Rarity::Epic, 0, 10, threshold(Points, 1000.0)),
    badge("platinum-master", "Platinum Master", "Earn 5000 points", Achievement, "💎", "#E5E4E2", Rarity::Legendary, 0, 11, threshold(Points, 5000.0)),
    badge("challenge-starter", "Challenge Starter", "Complete your first eco challenge", Challenge, "🌱", "#059669", Rarity::Common, 20, 12, threshold(Count, 1.0)),
    badge("challenge-champion", "Challenge Champion", "Complete 25 challenges", Challenge, "🌍", "#0EA5E9", Rarity::Epic, 100, 13, threshold(Count, 25.0)),
    badge("climate-expert", "Climate Expert", "Complete 5 quizzes on Climate Change & Global Warming", Quiz, "🌡️", "#DC2626", Rarity::Rare, 50, 14, subject_count("Climate Change & Global Warming", 5.0)),
    badge("biodiversity-guardian", "Biodiversity Guardian", "Complete 5 quizzes on Biodiversity & Ecosystems", Quiz, "🦋", "#059669", Rarity::Rare, 50, 15, subject_count("Biodiversity & Ecosystems", 5.0)),
    badge("energy-innovator", "Energy Innovator", "Complete 5 quizzes on Renewable Energy Sources", Quiz, "⚡", "#F59E0B", Rarity::Rare, 50, 16, subject_count("Renewable Energy Sources", 5.0)),
    badge("eco-all-rounder", "Eco All-Rounder", "Reach 1000 points with a 7-day streak and an 80% average", Special, "🌟", "#7C3AED", Rarity::Epic, 75, 17, combination(&[("points", 1000.0), ("streak", 7.0), ("score", 80.0)])),
  ]
}

#[allow(clippy::too_many_arguments)]
fn challenge(
  id: &str,
  title: &str,
  description: &str,
  category: &str,
  difficulty: &str,
  points: u32,
  duration_days: u32,
  impact: Impact,
  tips: &[&str],
) -> EcoChallenge {
  EcoChallenge {
    id: id.into(),
    title: title.into(),
    description: description.into(),
    category: category.into(),
    difficulty: difficulty.into(),
    points,
    daily_goal: 1,
    duration_days,
    impact,
    tips: tips.iter().map(|t| t.to_string()).collect(),
    is_active: true,
    max_participants: 1000,
    current_participants: 0,
  }
}

fn impact(plastic_saved: f64, co2_reduced: f64, water_saved: f64, energy_saved: f64) -> Impact {
  Impact { plastic_saved, co2_reduced, water_saved, energy_saved }
}

/// Minimal eco challenge catalog so the app is useful without external config.
pub fn seed_challenges() -> Vec<EcoChallenge> {
  vec![
    challenge(
      "plastic-free-week", "Plastic-Free Week",
      "Use reusable containers, bags and bottles for a whole week and track your plastic use.",
      "Waste Reduction", "Beginner", 150, 7, impact(0.5, 2.1, 0.0, 0.0),
      &["Carry a reusable water bottle", "Bring your own shopping bags"],
    ),
    challenge(
      "energy-conservation-master", "Energy Conservation Master",
      "Turn off lights, unplug idle devices and prefer efficient appliances.",
      "Energy Conservation", "Intermediate", 300, 14, impact(0.0, 5.2, 0.0, 2.5),
      &["Unplug chargers when not in use", "Set thermostat to energy-efficient temperatures"],
    ),
    challenge(
      "water-saving-hero", "Water Saving Hero",
      "Fix leaks, take shorter showers and collect rainwater for plants.",
      "Water Conservation", "Beginner", 200, 10, impact(0.0, 1.8, 50.0, 0.0),
      &["Take 5-minute showers", "Fix dripping faucets", "Collect rainwater for plants"],
    ),
    challenge(
      "plant-care-champion", "Plant Care Champion",
      "Grow native plants with organic soil and fertilizers.",
      "Plant Care", "Intermediate", 250, 21, impact(0.2, 3.5, 0.0, 0.0),
      &["Start with easy-to-grow plants", "Water plants in the morning"],
    ),
    challenge(
      "sustainable-transportation", "Sustainable Transportation",
      "Walk, bike, carpool or use public transport instead of driving alone.",
      "Transportation", "Advanced", 400, 30, impact(0.0, 8.5, 0.0, 0.0),
      &["Walk or bike for short trips", "Carpool with colleagues"],
    ),
    challenge(
      "zero-waste-kitchen", "Zero Waste Kitchen",
      "Compost food scraps, buy in bulk and eliminate single-use items.",
      "Waste Reduction", "Advanced", 350, 21, impact(1.2, 4.8, 0.0, 0.0),
      &["Buy food in bulk", "Compost kitchen scraps"],
    ),
    challenge(
      "eco-friendly-shopping", "Eco-Friendly Shopping",
      "Support local businesses and choose products with little packaging.",
      "Waste Reduction", "Beginner", 180, 14, impact(0.3, 2.5, 0.0, 0.0),
      &["Shop at local farmers markets", "Choose products with minimal packaging"],
    ),
    challenge(
      "climate-education", "Climate Education",
      "Read, watch and share something about climate science every day.",
      "Education", "Beginner", 120, 7, impact(0.0, 0.5, 0.0, 0.0),
      &["Read climate science articles", "Share knowledge with friends and family"],
    ),
  ]
}
