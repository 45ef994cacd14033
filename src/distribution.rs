use crate::error::{Error, Result};
use float_ord::FloatOrd;
use slice_group_by::GroupBy;
use std::cmp::Reverse;
use std::fmt;

/// Empirical distribution of rounded profits, highest profit first.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitDistribution {
    entries: Vec<(i64, f64)>,
}

impl ProfitDistribution {
    /// Groups per-scenario profits by their rounded value. Every scenario is equally likely.
    pub fn from_profits(profits: &[f64]) -> Self {
        let mut rounded = profits.iter().map(|p| p.round() as i64).collect::<Vec<_>>();
        rounded.sort_unstable_by_key(|&p| Reverse(p));

        let total = rounded.len() as f64;
        let entries = rounded
            .linear_group()
            .map(|group| (group[0], group.len() as f64 / total))
            .collect();

        Self { entries }
    }

    /// Builds a distribution from `(profit, probability)` pairs, merging equal profits
    pub fn from_entries(entries: impl IntoIterator<Item = (i64, f64)>) -> Self {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        entries.sort_by_key(|&(profit, _)| Reverse(profit));
        let entries = entries
            .linear_group_by_key(|&(profit, _)| profit)
            .map(|group| (group[0].0, group.iter().map(|(_, p)| p).sum::<f64>()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(i64, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn probability(&self, profit: i64) -> Option<f64> {
        self.entries.iter().find(|(p, _)| *p == profit).map(|(_, prob)| *prob)
    }

    pub fn total_probability(&self) -> f64 {
        self.entries.iter().map(|(_, p)| p).sum()
    }

    pub fn expected_value(&self) -> f64 {
        self.entries.iter().map(|&(v, p)| v as f64 * p).sum()
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        let mean = self.expected_value();
        self.entries
            .iter()
            .map(|&(v, p)| p * (v as f64 - mean).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Standard deviation relative to the expected value, `None` when that is zero
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        let mean = self.expected_value();
        (mean != 0.0).then(|| self.std_dev() / mean.abs())
    }

    pub fn min(&self) -> Option<i64> {
        self.entries.last().map(|(v, _)| *v)
    }

    pub fn max(&self) -> Option<i64> {
        self.entries.first().map(|(v, _)| *v)
    }

    /// Probabilities in whole percent, summing to exactly 100
    pub fn rounded_shares(&self) -> Vec<(i64, u32)> {
        let shares = self.entries.iter().map(|(_, p)| *p).collect::<Vec<_>>();
        self.entries
            .iter()
            .zip(round_shares(&shares))
            .map(|(&(v, _), cents)| (v, cents))
            .collect()
    }

    /// The same distribution with every probability rounded to two decimals
    pub fn rounded(&self) -> Self {
        let entries = self
            .rounded_shares()
            .into_iter()
            .map(|(v, cents)| (v, cents as f64 / 100.0))
            .collect();
        Self { entries }
    }

    /// The stored text form, `4800: 0.613; 4380: 0.285; 610: 0.102`
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(v, p)| format!("{}: {:?}", v, p))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Parses the output of [`render`](Self::render)
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || Error::MalformedDistribution(text.to_string());
        let entries = text
            .split("; ")
            .map(|item| {
                let (profit, probability) = item.split_once(": ").ok_or_else(malformed)?;
                let profit = profit.trim().parse::<f64>().map_err(|_| malformed())?;
                let probability = probability.trim().parse::<f64>().map_err(|_| malformed())?;
                Ok((profit.round() as i64, probability))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_entries(entries))
    }
}

/// `$4,800: 61%; $4,380: 29%; $610: 10%`
impl fmt::Display for ProfitDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = self
            .rounded_shares()
            .into_iter()
            .map(|(v, cents)| format!("{}: {}%", dollars(v), cents))
            .collect::<Vec<_>>();
        write!(f, "{}", items.join("; "))
    }
}

/// Formats an amount as `$4,253`
pub fn dollars(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{}${}", sign, grouped)
}

/// Rounds shares of a whole to integer percentages that sum to exactly 100.
///
/// Each share is rounded to the nearest percent. Missing percents go to the shares
/// that lost most in rounding, surplus percents are taken from the shares that gained
/// most. Ties go to the earlier share.
pub fn round_shares(shares: &[f64]) -> Vec<u32> {
    let mut cents = shares.iter().map(|p| (p * 100.0).round() as i64).collect::<Vec<_>>();
    let remainder = 100 - cents.iter().sum::<i64>();
    let loss = |i: usize| FloatOrd(shares[i] * 100.0 - cents[i] as f64);

    let mut order = (0..shares.len()).collect::<Vec<_>>();
    if remainder > 0 {
        order.sort_by_key(|&i| Reverse(loss(i)));
    } else {
        order.sort_by_key(|&i| loss(i));
    }

    let step = remainder.signum();
    for &i in order.iter().cycle().take(remainder.unsigned_abs() as usize) {
        cents[i] += step;
    }

    cents.into_iter().map(|c| c.max(0) as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provided() -> ProfitDistribution {
        let mut profits = vec![4800.0; 613];
        profits.extend(vec![4380.0; 285]);
        profits.extend(vec![610.0; 102]);
        ProfitDistribution::from_profits(&profits)
    }

    #[test]
    fn groups_profits_in_descending_order() {
        let distribution = ProfitDistribution::from_profits(&[610.0, 4800.2, 4799.9, 4380.0]);
        assert_eq!(distribution.entries(), &[(4800, 0.5), (4380, 0.25), (610, 0.25)]);
        assert_eq!(distribution.max(), Some(4800));
        assert_eq!(distribution.min(), Some(610));
    }

    #[test]
    fn statistics() {
        let distribution = provided();
        assert!((distribution.total_probability() - 1.0).abs() < 1e-12);
        assert!((distribution.expected_value() - 4252.92).abs() < 1e-6);
        assert_eq!(distribution.expected_value().round(), 4253.0);
        assert_eq!(distribution.std_dev().round(), 1242.0);
        assert_eq!((distribution.coefficient_of_variation().unwrap() * 100.0).round(), 29.0);

        let certain = ProfitDistribution::from_profits(&[3870.0; 10]);
        assert_eq!(certain.std_dev(), 0.0);
        assert_eq!(certain.coefficient_of_variation(), Some(0.0));
        assert_eq!(ProfitDistribution::from_profits(&[0.0]).coefficient_of_variation(), None);
    }

    #[test]
    fn shares_sum_to_one_hundred() {
        assert_eq!(round_shares(&[0.613, 0.285, 0.102]), vec![61, 29, 10]);
        assert_eq!(round_shares(&[1.0 / 3.0; 3]), vec![34, 33, 33]);
        assert_eq!(round_shares(&[0.005, 0.005, 0.99]), vec![0, 1, 99]);
        // rounding up too much takes from the share that gained most
        assert_eq!(round_shares(&[0.125, 0.125, 0.125, 0.625]).iter().sum::<u32>(), 100);
        assert_eq!(round_shares(&[0.166, 0.166, 0.166, 0.166, 0.166, 0.17]).iter().sum::<u32>(), 100);
        assert!(round_shares(&[]).is_empty());
    }

    #[test]
    fn persisted_text() {
        let distribution = provided();
        assert_eq!(distribution.render(), "4800: 0.613; 4380: 0.285; 610: 0.102");
        assert_eq!(ProfitDistribution::parse(&distribution.render()).unwrap(), distribution);

        let rounded = ProfitDistribution::parse("4225: 0.898; 3470: 0.102").unwrap().rounded();
        assert_eq!(rounded.entries(), &[(4225, 0.9), (3470, 0.1)]);

        assert!(ProfitDistribution::parse("4800 - 0.5").is_err());
        assert!(ProfitDistribution::parse("abc: 0.5").is_err());
    }

    #[test]
    fn display() {
        assert_eq!(provided().to_string(), "$4,800: 61%; $4,380: 29%; $610: 10%");
        assert_eq!(dollars(1_234_567), "$1,234,567");
        assert_eq!(dollars(-610), "-$610");
        assert_eq!(dollars(0), "$0");
    }
}
