//! Closed vocabularies shared by the store and the services

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Forecasting model that produced a forecast row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    Baseline,
    Sarimax,
}

impl ForecastModel {
    pub const ALL: [ForecastModel; 2] = [ForecastModel::Baseline, ForecastModel::Sarimax];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Sarimax => "sarimax",
        }
    }
}

impl FromStr for ForecastModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(Self::Baseline),
            "sarimax" => Ok(Self::Sarimax),
            _ => Err(format!(
                "unknown model '{}', expected one of: baseline, sarimax",
                s
            )),
        }
    }
}

impl fmt::Display for ForecastModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecast target variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastVariable {
    Pv,
    Wind,
}

impl ForecastVariable {
    pub const ALL: [ForecastVariable; 2] = [ForecastVariable::Pv, ForecastVariable::Wind];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pv => "pv",
            Self::Wind => "wind",
        }
    }
}

impl FromStr for ForecastVariable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pv" => Ok(Self::Pv),
            "wind" => Ok(Self::Wind),
            _ => Err(format!("unknown var '{}', expected one of: pv, wind", s)),
        }
    }
}

impl fmt::Display for ForecastVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline layer, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Raw,
    Fact,
    Features,
    Kpis,
    Forecast,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::Raw,
        Layer::Fact,
        Layer::Features,
        Layer::Kpis,
        Layer::Forecast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Fact => "fact",
            Self::Features => "features",
            Self::Kpis => "kpis",
            Self::Forecast => "forecast",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Raw => "raw_weather",
            Self::Fact => "fact_weather",
            Self::Features => "mart_features",
            Self::Kpis => "mart_kpis",
            Self::Forecast => "mart_forecast",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_model_parse() {
        assert_eq!("baseline".parse::<ForecastModel>(), Ok(ForecastModel::Baseline));
        assert_eq!("sarimax".parse::<ForecastModel>(), Ok(ForecastModel::Sarimax));
        assert!("arima".parse::<ForecastModel>().unwrap_err().contains("arima"));
        // Case-sensitive, matching the store CHECK
        assert!("Sarimax".parse::<ForecastModel>().is_err());
    }

    #[test]
    fn test_forecast_variable_parse() {
        for var in ForecastVariable::ALL {
            assert_eq!(var.as_str().parse::<ForecastVariable>(), Ok(var));
        }
        assert!("solar".parse::<ForecastVariable>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        for model in ForecastModel::ALL {
            assert_eq!(
                serde_json::to_string(&model).unwrap(),
                format!("\"{}\"", model.as_str())
            );
        }
        assert_eq!(serde_json::to_string(&Layer::Kpis).unwrap(), "\"kpis\"");
    }

    #[test]
    fn test_layer_tables() {
        let tables: Vec<_> = Layer::ALL.iter().map(|l| l.table()).collect();
        assert_eq!(
            tables,
            vec!["raw_weather", "fact_weather", "mart_features", "mart_kpis", "mart_forecast"]
        );
    }
}
