//! Built-in course content: challenge sets and matching boards that make the
//! app useful without any TOML configuration.

use crate::domain::{AnswerPolicy, ChallengeItem, ChallengeSet};
use crate::error::{ChallengeSetError, MatchingError};
use crate::matching::{BoardSpec, DropTarget};

fn mc(id: u32, prompt: &str, choices: [&str; 4], correct: &str, explanation: &str) -> ChallengeItem {
  ChallengeItem {
    id,
    prompt: prompt.into(),
    choices: choices.iter().map(|c| c.to_string()).collect(),
    correct_choice: correct.into(),
    explanation: explanation.into(),
    context: None,
    skill_focus: None,
  }
}

fn scenario(mut item: ChallengeItem, context: &str, skill: &str) -> ChallengeItem {
  item.context = Some(context.into());
  item.skill_focus = Some(skill.into());
  item
}

fn free_text(id: u32, prompt: &str, accepted: &str, explanation: &str) -> ChallengeItem {
  ChallengeItem {
    id,
    prompt: prompt.into(),
    choices: vec![],
    correct_choice: accepted.into(),
    explanation: explanation.into(),
    context: None,
    skill_focus: None,
  }
}

pub fn z_score_game() -> Result<ChallengeSet, ChallengeSetError> {
  let items = vec![
    scenario(
      mc(
        1,
        "What is the Z-score for a test score of 94?",
        ["Z = +1.5", "Z = +2.0", "Z = +1.0", "Z = +2.5"],
        "Z = +2.0",
        "Z = (94 - 82) / 6 = 12 / 6 = 2.0. This score is exactly 2 standard deviations above the mean.",
      ),
      "Test Scores: mean 82, sd 6 points",
      "Calculating Z-scores using the formula Z = (X - μ) / σ",
    ),
    scenario(
      mc(
        2,
        "A height of 62 inches has Z = -2.0. What does this mean?",
        [
          "This height is extremely common",
          "This height is 2 standard deviations below average - quite short",
          "This height is exactly average for the population",
          "This height indicates a measurement error",
        ],
        "This height is 2 standard deviations below average - quite short",
        "Z = -2.0 means this height is 2 standard deviations below the mean. Only about 2.5% of people are this short or shorter - it's quite unusual.",
      ),
      "Heights: mean 68, sd 3 inches",
      "Interpreting negative Z-scores and their practical meaning",
    ),
    scenario(
      mc(
        3,
        "How does a reaction time of 225ms compare to the population?",
        [
          "Slower than average (above mean)",
          "About average performance",
          "Much faster than average (Z = -1.5)",
          "Extremely fast (Z = -3.0)",
        ],
        "Much faster than average (Z = -1.5)",
        "Z = (225 - 300) / 50 = -75 / 50 = -1.5. This person reacts 1.5 standard deviations faster than average - quite quick reflexes!",
      ),
      "Reaction Times: mean 300, sd 50 milliseconds",
      "Comparing individual values to population using Z-scores",
    ),
    scenario(
      mc(
        4,
        "A product weighs 265g. Your quality control rule flags items beyond Z = ±2.0. What action should you take?",
        [
          "Accept the product - within normal variation",
          "Flag for inspection - exceeds 2 SD limit (Z = +3.0)",
          "Reject immediately - clearly defective",
          "Recalibrate the scale - impossible reading",
        ],
        "Flag for inspection - exceeds 2 SD limit (Z = +3.0)",
        "Z = (265 - 250) / 5 = 15 / 5 = 3.0. This exceeds your ±2.0 limit and should be flagged. A Z-score of 3.0 indicates a potential process problem.",
      ),
      "Quality Control: mean 250, sd 5 grams",
      "Applying Z-scores for quality control and decision-making",
    ),
    scenario(
      mc(
        5,
        "A student scored 62%. How should this performance be characterized?",
        [
          "Slightly below average - minor concern",
          "Significantly below average (Z = -2.0) - needs intervention",
          "Average performance for this class",
          "Above average considering the difficulty",
        ],
        "Significantly below average (Z = -2.0) - needs intervention",
        "Z = (62 - 78) / 8 = -16 / 8 = -2.0. This student is 2 standard deviations below average, indicating serious academic difficulty requiring intervention.",
      ),
      "Student Performance: mean 78, sd 8 percent",
      "Using Z-scores to identify students needing academic support",
    ),
    scenario(
      mc(
        6,
        "Compare two employees: Employee A scored Z = +1.5, Employee B sold $21,000. Who performed better?",
        [
          "Employee A performed better",
          "Employee B performed better (Z = +2.0)",
          "They performed equally well",
          "Cannot determine without more information",
        ],
        "Employee B performed better (Z = +2.0)",
        "Employee B: Z = (21000 - 15000) / 3000 = 6000 / 3000 = 2.0. Employee B's Z = +2.0 is higher than Employee A's Z = +1.5, indicating better relative performance.",
      ),
      "Sales Performance: mean 15000, sd 3000 dollars",
      "Comparing performance across individuals using standardized Z-scores",
    ),
  ];
  ChallengeSet::new("z-score-game", "Z-Score Game", 5, items, AnswerPolicy::Normalized)
}

pub fn statistics_game() -> Result<ChallengeSet, ChallengeSetError> {
  let items = vec![
    mc(
      1,
      "What is the main purpose of statistics?",
      [
        "To create complex mathematical formulas",
        "To measure, understand, and adapt to variation",
        "To prove that all data is accurate",
        "To make data look more professional",
      ],
      "To measure, understand, and adapt to variation",
      "Statistics is fundamentally about dealing with variation - measuring it, understanding patterns in it, and making decisions despite uncertainty.",
    ),
    mc(
      2,
      "A market research company surveys 500 randomly selected smartphone users to estimate what percentage of all smartphone users prefer iOS over Android. What is the population in this study?",
      [
        "The 500 surveyed smartphone users",
        "All smartphone users everywhere",
        "Only iOS users",
        "The 45% who prefer iOS",
      ],
      "All smartphone users everywhere",
      "The population is the entire group we want to learn about - all smartphone users. The sample is the 500 people we actually surveyed.",
    ),
    mc(
      3,
      "A weather forecasting service uses historical data and current conditions to predict tomorrow's temperature. Which statistical concept does this best demonstrate?",
      [
        "Measuring variation only",
        "Understanding variation only",
        "Reducing/adapting to variation",
        "Creating variation",
      ],
      "Reducing/adapting to variation",
      "Weather forecasting attempts to reduce uncertainty about future conditions by using statistical models to make the best possible predictions despite natural variation.",
    ),
    mc(
      4,
      "A fitness app tracks 'workout intensity level' as: Light, Moderate, Vigorous, High, Maximum. What type of variable is this?",
      [
        "Quantitative - Discrete",
        "Quantitative - Continuous",
        "Categorical - Nominal",
        "Categorical - Ordinal",
      ],
      "Categorical - Ordinal",
      "These are categories (not numbers) but they have a clear order from least to most intense. Ordinal categorical data has meaningful ranking.",
    ),
    mc(
      5,
      "A study measures 'reaction time in milliseconds' for video game players. What type of variable is this?",
      [
        "Categorical - Ordinal",
        "Quantitative - Discrete",
        "Quantitative - Continuous",
        "Identifier",
      ],
      "Quantitative - Continuous",
      "Time can be measured with increasing precision and can take any value within a range, making it continuous quantitative data.",
    ),
    mc(
      6,
      "What is the key difference between a parameter and a statistic?",
      [
        "Parameters are always larger than statistics",
        "Parameters describe populations; statistics describe samples",
        "Parameters are more accurate than statistics",
        "There is no difference",
      ],
      "Parameters describe populations; statistics describe samples",
      "Parameters are true facts about entire populations (usually unknown), while statistics are calculations from sample data that estimate parameters.",
    ),
  ];
  ChallengeSet::new("statistics-game", "Statistics Game Challenge", 1, items, AnswerPolicy::Normalized)
}

pub fn vector_challenge() -> Result<ChallengeSet, ChallengeSetError> {
  let items = vec![
    free_text(
      1,
      "Create a numeric vector called 'x' with the numbers 2, 6, 1, 0, and 5",
      "x<-c(2,6,1,0,5)||x=c(2,6,1,0,5)",
      "In R, we use x <- c() to save values into a vector named 'x'. The values are separated by commas.",
    ),
    free_text(
      2,
      "Save a sequence from 1 to 78 (incremented by 0.2) into a vector called 'x'",
      "x<-seq(from=1,to=78,by=0.2)||x=seq(from=1,to=78,by=0.2)",
      "The seq() function creates sequences. We save it to 'x' using the assignment operator <-",
    ),
    free_text(
      3,
      "Create a vector 'x' that repeats the string \"Hello\" 10 times",
      "x<-rep(\"Hello\",times=10)||x=rep(\"Hello\",times=10)",
      "The rep() function repeats values. We save the result to 'x' using <-",
    ),
    free_text(
      4,
      "Create a factor vector 'x' with the values 'up' and 'down', in the order: up, up, down, up",
      "x<-factor(c(\"up\",\"up\",\"down\",\"up\"))||x=factor(c(\"up\",\"up\",\"down\",\"up\"))",
      "Combine factor() with c() to create categorical data, saving to 'x' using <-",
    ),
    free_text(
      5,
      "Given x <- c(2, 5, 3, 8, 7), use which() to find the positions of elements equal to 3",
      "which(x==3)",
      "which() returns the positions where a condition is TRUE. Here we check where x equals 3.",
    ),
    free_text(
      6,
      "Given x <- c(1, 5, 3, 8, 7), use which() to find positions where elements are between 2 and 6 inclusive",
      "which(x>=2&x<=6)",
      "Combine conditions with & (AND) to find elements in a range. Both conditions must be true.",
    ),
  ];
  ChallengeSet::new("vector-challenge", "Vector Challenge", 3, items, AnswerPolicy::Compact)
}

pub fn seed_challenge_sets() -> Vec<Result<ChallengeSet, ChallengeSetError>> {
  vec![z_score_game(), statistics_game(), vector_challenge()]
}

pub fn association_types_board() -> Result<BoardSpec, MatchingError> {
  let rows = [
    (
      "qq",
      "Quantitative-Quantitative",
      ["Scatterplot", "Pearson/Spearman", "First: Monotonic, then heteroskedasticity, non-linear, outlier"],
    ),
    ("qc", "Quantitative-Categorical", ["Side by Side box plots", "Mean and medians", "QQ Plots"]),
    ("cc", "Categorical-Categorical", ["Mosaic", "Chi squared", "Differences in conditional distribution"]),
  ];
  let fields = [("visual", "Visual"), ("test", "Test"), ("look", "Look for")];

  let mut targets = Vec::new();
  for (id, group, answers) in rows {
    for ((key, label), answer) in fields.iter().zip(answers) {
      targets.push(DropTarget {
        key: format!("{id}-{key}"),
        group: group.into(),
        label: (*label).into(),
        expected: answer.into(),
      });
    }
  }
  let labels = [
    "Chi squared",
    "Side by Side box plots",
    "First: Monotonic, then heteroskedasticity, non-linear, outlier",
    "Mosaic",
    "Pearson/Spearman",
    "QQ Plots",
    "Differences in conditional distribution",
    "Scatterplot",
    "Mean and medians",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect();
  BoardSpec::new("association-types", "Association Types", 2, targets, labels)
}

pub fn seed_boards() -> Vec<Result<BoardSpec, MatchingError>> {
  vec![association_types_board()]
}
