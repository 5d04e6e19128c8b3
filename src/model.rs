//! Tag correlation model.
//!
//! For every source tag, an ordered list of related tags with cumulative
//! probabilities, in the order the table was read. The list order is what
//! makes the cumulative sequence non-decreasing, so it is never re-sorted.
//!
//! The model is built once and is read-only afterwards; share it between
//! workers behind an `Arc`.
//!
//! ## Table format
//!
//! One edge per line, three whitespace-separated fields:
//!
//! ```text
//! <source tag> <related tag> <cumulative probability>
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::str::FromStr;

use rand::Rng;
use tracing::info;

use crate::error::ModelError;

/// Tag (category) identifier.
pub type TagId = u32;

/// Slack allowed above 1.0 for cumulative sums written with limited precision.
const PROBABILITY_SLACK: f64 = 1e-9;

/// One related tag and the cumulative probability up to and including it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub related: TagId,
    pub cumulative: f64,
}

/// Immutable tag → related-tags distribution.
#[derive(Debug, Clone, Default)]
pub struct CorrelationModel {
    related: BTreeMap<TagId, Vec<Correlation>>,
    /// Every source tag, ascending. Never contains a tag with an empty list.
    known: Vec<TagId>,
    edges: usize,
}

impl CorrelationModel {
    /// Build a model from `(source, related, cumulative)` triples.
    ///
    /// Triples for one source tag may be interleaved with other tags; their
    /// relative order is kept. Fails on the first non-finite, out-of-range
    /// or decreasing cumulative probability.
    pub fn from_triples<I>(triples: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (TagId, TagId, f64)>,
    {
        let mut related: BTreeMap<TagId, Vec<Correlation>> = BTreeMap::new();
        let mut edges = 0usize;

        for (source, tag, cumulative) in triples {
            push_edge(&mut related, source, tag, cumulative)?;
            edges += 1;
        }

        Ok(Self::finish(related, edges))
    }

    /// Parse the line-oriented table from a reader.
    ///
    /// Blank lines are skipped. Line numbers in errors are 1-based.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ModelError> {
        let mut related: BTreeMap<TagId, Vec<Correlation>> = BTreeMap::new();
        let mut edges = 0usize;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 3 {
                return Err(ModelError::FieldCount {
                    line: line_no,
                    found: fields.len(),
                });
            }

            let source = parse_field::<TagId>(line_no, "source tag", fields[0])?;
            let tag = parse_field::<TagId>(line_no, "related tag", fields[1])?;
            let cumulative = parse_field::<f64>(line_no, "cumulative probability", fields[2])?;

            push_edge(&mut related, source, tag, cumulative)?;
            edges += 1;
        }

        Ok(Self::finish(related, edges))
    }

    fn finish(related: BTreeMap<TagId, Vec<Correlation>>, edges: usize) -> Self {
        let known: Vec<TagId> = related.keys().copied().collect();
        info!(categories = known.len(), edges, "loaded correlation model");
        Self {
            related,
            known,
            edges,
        }
    }

    /// Correlations of `tag`, or `None` if the tag is not a source tag.
    pub fn get(&self, tag: TagId) -> Option<&[Correlation]> {
        self.related.get(&tag).map(Vec::as_slice)
    }

    /// Correlations of `tag`; empty for unknown tags.
    pub fn correlations(&self, tag: TagId) -> &[Correlation] {
        self.get(tag).unwrap_or(&[])
    }

    pub fn contains(&self, tag: TagId) -> bool {
        self.related.contains_key(&tag)
    }

    /// All source tags, ascending.
    pub fn known_categories(&self) -> &[TagId] {
        &self.known
    }

    /// Number of source tags.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Number of loaded edges across all source tags.
    pub fn num_edges(&self) -> usize {
        self.edges
    }

    /// Iterate `(source tag, correlations)` in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (TagId, &[Correlation])> + '_ {
        self.related.iter().map(|(&t, c)| (t, c.as_slice()))
    }

    /// Uniformly random known tag.
    ///
    /// # Panics
    ///
    /// Panics if the model is empty.
    pub fn random_known<R: Rng + ?Sized>(&self, rng: &mut R) -> TagId {
        assert!(
            !self.known.is_empty(),
            "random_known: correlation model must be non-empty"
        );
        self.known[rng.random_range(0..self.known.len())]
    }

    /// `tag` if it is known, otherwise a uniformly random known tag.
    ///
    /// Consumes randomness only on the fallback path.
    ///
    /// # Panics
    ///
    /// Panics if the model is empty and `tag` is unknown.
    pub fn resolve_known<R: Rng + ?Sized>(&self, tag: TagId, rng: &mut R) -> TagId {
        if self.contains(tag) {
            tag
        } else {
            self.random_known(rng)
        }
    }
}

impl FromStr for CorrelationModel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_reader(s.as_bytes())
    }
}

fn parse_field<T: FromStr>(line: usize, field: &'static str, raw: &str) -> Result<T, ModelError> {
    raw.parse().map_err(|_| ModelError::Parse {
        line,
        field,
        value: raw.to_string(),
    })
}

fn push_edge(
    related: &mut BTreeMap<TagId, Vec<Correlation>>,
    source: TagId,
    tag: TagId,
    cumulative: f64,
) -> Result<(), ModelError> {
    if !cumulative.is_finite() || !(0.0..=1.0 + PROBABILITY_SLACK).contains(&cumulative) {
        return Err(ModelError::InvalidProbability {
            source_tag: source,
            value: cumulative,
        });
    }

    let list = related.entry(source).or_default();
    if let Some(last) = list.last() {
        if cumulative < last.cumulative {
            return Err(ModelError::Decreasing {
                source_tag: source,
                previous: last.cumulative,
                value: cumulative,
            });
        }
    }
    list.push(Correlation {
        related: tag,
        cumulative,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const TABLE: &str = "1 2 0.5\n1 3 1.0\n\n7 1 0.2\n7 9 0.9\n7 4 1.0\n";

    #[test]
    fn parses_table_in_order() {
        let m: CorrelationModel = TABLE.parse().expect("valid table");
        assert_eq!(m.len(), 2);
        assert_eq!(m.num_edges(), 5);
        assert_eq!(m.known_categories(), &[1, 7]);

        let related: Vec<TagId> = m.correlations(7).iter().map(|c| c.related).collect();
        assert_eq!(related, vec![1, 9, 4]);
        assert_eq!(m.correlations(1)[0].cumulative, 0.5);
        assert!(m.get(99).is_none());
        assert!(m.correlations(99).is_empty());
    }

    #[test]
    fn interleaved_triples_keep_per_tag_order() {
        let m = CorrelationModel::from_triples([(5, 10, 0.1), (6, 11, 0.4), (5, 12, 1.0)])
            .expect("valid triples");
        let related: Vec<TagId> = m.correlations(5).iter().map(|c| c.related).collect();
        assert_eq!(related, vec![10, 12]);
        assert_eq!(m.known_categories(), &[5, 6]);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = "1 2 0.5\n1 3\n"
            .parse::<CorrelationModel>()
            .expect_err("short line");
        assert!(matches!(err, ModelError::FieldCount { line: 2, found: 2 }));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = "1 x 0.5\n".parse::<CorrelationModel>().expect_err("bad tag");
        assert!(matches!(
            err,
            ModelError::Parse { line: 1, field: "related tag", .. }
        ));

        let err = "1 2 half\n".parse::<CorrelationModel>().expect_err("bad float");
        assert!(matches!(
            err,
            ModelError::Parse {
                line: 1,
                field: "cumulative probability",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unreadable_input() {
        let err = CorrelationModel::from_reader(&b"1 2 0.5\n1 \xff 1.0\n"[..])
            .expect_err("invalid utf-8");
        assert!(matches!(err, ModelError::Io(_)));
    }

    #[test]
    fn read_failure_is_reported() {
        struct Broken;

        impl std::io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }

        let err = CorrelationModel::from_reader(std::io::BufReader::new(Broken))
            .expect_err("read error");
        assert!(matches!(err, ModelError::Io(ref e) if e.to_string() == "disk gone"));
    }

    #[test]
    fn rejects_decreasing_cumulative() {
        let err = CorrelationModel::from_triples([(1, 2, 0.6), (1, 3, 0.4)])
            .expect_err("decreasing");
        assert!(matches!(err, ModelError::Decreasing { source_tag: 1, .. }));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        for bad in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let err = CorrelationModel::from_triples([(1, 2, bad)]).expect_err("out of range");
            assert!(matches!(err, ModelError::InvalidProbability { .. }));
        }
    }

    #[test]
    fn empty_input_gives_empty_model() {
        let m: CorrelationModel = "".parse().expect("empty is valid");
        assert!(m.is_empty());
        assert_eq!(m.num_edges(), 0);
    }

    #[test]
    fn resolve_known_substitutes_unknown() {
        let m: CorrelationModel = TABLE.parse().expect("valid table");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(m.resolve_known(7, &mut rng), 7);
        for _ in 0..50 {
            let t = m.resolve_known(99, &mut rng);
            assert!(m.contains(t));
        }
    }
}
