//! Chapter/topic catalog and previous/next navigation between topic pages.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Topic {
  pub title: &'static str,
  pub slug: &'static str,
  pub order: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Chapter {
  pub number: u32,
  pub title: &'static str,
  pub slug: &'static str,
  pub topics: &'static [Topic],
}

const fn t(title: &'static str, slug: &'static str, order: u32) -> Topic {
  Topic { title, slug, order }
}

pub static CHAPTERS: &[Chapter] = &[
  Chapter {
    number: 1,
    title: "Introduction to Statistics",
    slug: "/chapters/1",
    topics: &[
      t("What is Statistics?", "/chapters/1/what-is-statistics", 1),
      t("Populations & Samples", "/chapters/1/populations-samples", 2),
      t("Variables & Data Types", "/chapters/1/variables-data-types", 3),
      t("Statistics Game Challenge", "/chapters/1/statistics-game", 4),
    ],
  },
  Chapter {
    number: 2,
    title: "Univariate Displays",
    slug: "/chapters/2",
    topics: &[
      t("Categorical Displays", "/chapters/2/categorical-displays", 1),
      t("Quantitative Displays", "/chapters/2/quantitative-displays", 2),
      t("Center & Spread", "/chapters/2/center-spread", 3),
    ],
  },
  Chapter {
    number: 3,
    title: "Bivariate Categorical Displays",
    slug: "/chapters/3",
    topics: &[
      t("Contingency Tables", "/chapters/3/contingency-tables", 1),
      t("Segmented Bar Charts", "/chapters/3/segmented-bar-charts", 2),
      t("Independence vs Association", "/chapters/3/independence-association", 3),
    ],
  },
  Chapter {
    number: 4,
    title: "Comparing Distributions",
    slug: "/chapters/4",
    topics: &[
      t("Stacked Histograms", "/chapters/4/stacked-histograms", 1),
      t("Five-Number Summary", "/chapters/4/five-number-summary", 2),
      t("Boxplots & Outliers", "/chapters/4/boxplots", 3),
      t("Boxplot Association Analysis", "/chapters/4/boxplot-association", 4),
    ],
  },
  Chapter {
    number: 5,
    title: "The Normal Model",
    slug: "/chapters/5",
    topics: &[
      t("Normal Distribution Basics", "/chapters/5/normal-basics", 1),
      t("Z-Scores & Standardization", "/chapters/5/z-scores", 2),
      t("68-95-99.7 Rule", "/chapters/5/empirical-rule", 3),
      t("Normal Probability Plots", "/chapters/5/normal-plots", 4),
    ],
  },
  Chapter {
    number: 6,
    title: "Correlation",
    slug: "/chapters/6",
    topics: &[
      t("Scatterplots", "/chapters/6/scatterplots", 1),
      t("Direction, Form & Strength", "/chapters/6/direction-form-strength", 2),
      t("Correlation Coefficient", "/chapters/6/correlation-coefficient", 3),
      t("Correlation vs Causation", "/chapters/6/correlation-causation", 4),
      t("Correlation Detective Game", "/chapters/6/correlation-game", 5),
    ],
  },
  Chapter {
    number: 7,
    title: "Associations",
    slug: "/chapters/7",
    topics: &[
      t("Visual Arsenal", "/chapters/7/visualizations", 1),
      t("Association Types", "/chapters/7/association-types", 2),
      t("Quantitative-Quantitative", "/chapters/7/quantitative-quantitative", 3),
      t("Quantitative-Categorical", "/chapters/7/quantitative-categorical", 4),
      t("Categorical-Categorical", "/chapters/7/categorical-categorical", 5),
      t("Visual ID Challenge", "/chapters/7/visual-id", 6),
    ],
  },
  Chapter {
    number: 8,
    title: "R Basics",
    slug: "/chapters/8",
    topics: &[
      t("R Studio Setup", "/chapters/8/r-studio-setup", 1),
      t("R Arithmetic Practice", "/chapters/8/r-arithmetic-game", 2),
      t("Vector Challenge", "/chapters/8/vector-challenge", 3),
      t("Data Frame Challenge", "/chapters/8/data-frame-challenge", 4),
      t("Summary Functions", "/chapters/8/summary-functions", 5),
    ],
  },
  Chapter {
    number: 9,
    title: "Simple Linear Regression",
    slug: "/chapters/9",
    topics: &[
      t("Linear Equation", "/chapters/9/linear-equation", 1),
      t("Sum of Squared Error & Naive Model", "/chapters/9/sum-of-squared-error", 2),
      t("Making Predictions", "/chapters/9/making-predictions", 3),
      t("Transformations", "/chapters/9/transformations", 4),
      t("Interpreting Summary Output", "/chapters/9/interpreting-summary-output", 5),
      t("Regression Assumptions", "/chapters/9/regression-assumptions", 6),
    ],
  },
  Chapter {
    number: 10,
    title: "Multiple Regression",
    slug: "/chapters/10",
    topics: &[
      t("Multiple Regression Intro", "/chapters/10/multiple-regression-intro", 1),
      t("Multiple Equation", "/chapters/10/multiple-equation", 2),
      t("Interpreting Multiple Output", "/chapters/10/interpreting-multiple-output", 3),
      t("Multiple Regression Assumptions", "/chapters/10/multiple-regression-assumptions", 4),
      t("Multicollinearity", "/chapters/10/multicollinearity", 5),
      t("Interaction Variables", "/chapters/10/interaction-variables", 6),
    ],
  },
  Chapter {
    number: 11,
    title: "Categorical Variables",
    slug: "/chapters/11",
    topics: &[
      t("Encoding Indicator Variables", "/chapters/11/encoding-indicator-variables", 1),
      t("Regression Equation", "/chapters/11/regression-equation", 2),
      t("Interpreting Summary Output", "/chapters/11/interpreting-summary-output", 3),
      t("Visual Indicator Variables", "/chapters/11/visual-indicator-variables", 4),
    ],
  },
  Chapter {
    number: 12,
    title: "Logistic Regression",
    slug: "/chapters/12",
    topics: &[
      t("What IS Logistic Regression?", "/chapters/12/visual-logistic", 1),
      t("Logistic Foundations", "/chapters/12/logistic-foundations", 2),
      t("Interpreting Output", "/chapters/12/interpreting-output", 3),
      t("Confusion Matrices & Accuracy", "/chapters/12/confusion-matrices", 4),
      t("Checking Logistic Regression", "/chapters/12/checking-regression", 5),
    ],
  },
  Chapter {
    number: 13,
    title: "Model Building",
    slug: "/chapters/13",
    topics: &[
      t("Descriptive Modeling", "/chapters/13/descriptive-vs-predictive", 1),
      t("Predictive Modeling", "/chapters/13/predictive-modeling", 2),
      t("Model Hierarchy & Interactions", "/chapters/13/model-hierarchy", 3),
      t("Building Models with R", "/chapters/13/building-models-r", 4),
    ],
  },
];

pub fn chapter(number: u32) -> Option<&'static Chapter> {
  CHAPTERS.iter().find(|c| c.number == number)
}

/// Chapter referenced by a `/chapters/<n>/...` path.
pub fn chapter_for_path(path: &str) -> Option<&'static Chapter> {
  path.split('/').nth(2).and_then(|n| n.parse().ok()).and_then(chapter)
}

/// Title to report for a route (topic title, chapter title, or the path).
pub fn page_title(path: &str) -> String {
  let nav = navigation_info(path);
  nav
    .current_topic_title
    .map(str::to_string)
    .unwrap_or_else(|| nav.chapter_title.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationInfo {
  pub chapter_home: &'static str,
  pub chapter_title: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub current_topic_title: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub previous_topic: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next_topic: Option<&'static str>,
}

/// Neighbouring topics fall back to the chapter home at either end.
pub fn navigation_info(path: &str) -> NavigationInfo {
  let Some(ch) = chapter_for_path(path) else {
    return NavigationInfo {
      chapter_home: "/chapters",
      chapter_title: "Chapters",
      current_topic_title: None,
      previous_topic: None,
      next_topic: None,
    };
  };
  let chapter_only = NavigationInfo {
    chapter_home: ch.slug,
    chapter_title: ch.title,
    current_topic_title: None,
    previous_topic: None,
    next_topic: None,
  };
  let has_topic = path.split('/').nth(3).is_some_and(|s| !s.is_empty());
  if !has_topic {
    return chapter_only;
  }
  let Some(i) = ch.topics.iter().position(|t| t.slug == path) else {
    return chapter_only;
  };
  NavigationInfo {
    current_topic_title: Some(ch.topics[i].title),
    previous_topic: Some(if i > 0 { ch.topics[i - 1].slug } else { ch.slug }),
    next_topic: Some(ch.topics.get(i + 1).map_or(ch.slug, |t| t.slug)),
    ..chapter_only
  }
}
