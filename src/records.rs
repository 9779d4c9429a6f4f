//! # Line codecs at the pipeline boundary
//!
//! The core works on in-memory values; this module decodes and encodes the text
//! records exchanged with the surrounding ingestion and persistence jobs.
//!
//! Rating input comes in two layouts:
//!
//! - **user lines**: `userId item:score, item:score ...` (whitespace separated tokens,
//!   trailing commas ignored). A bad user id drops the line; a bad token drops only
//!   that token.
//! - **blocks**: a header `userId|count` followed by `count` lines of
//!   `itemId<TAB>score[<TAB>date<TAB>time]`. Lines outside a block are dropped.
//!
//! Similarity pairs travel as `(A, B)<TAB>score`, neighbour rows as
//! `item<TAB>n1:s1,n2:s2`.
//!
//! Malformed records never abort a read: they are logged with `warn!`, counted in
//! `ReadStats` and skipped. Only I/O failures are returned as errors.

use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, Write};

use log::{debug, warn};

use crate::core::{ItemId, NeighborList, Rating, SimilarityPair, UserId, UserRatings};
use crate::error::{KnnError, KnnResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Records decoded successfully.
    pub records: usize,
    /// Records dropped as malformed.
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatingFormat {
    UserLines,
    Blocks,
}

fn parse_id(s: &str, line: usize, what: &str) -> KnnResult<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| KnnError::malformed(line, format!("invalid {what} id {s:?}")))
}

fn parse_score(s: &str, line: usize) -> KnnResult<f64> {
    let v = s
        .trim()
        .parse::<f64>()
        .map_err(|_| KnnError::malformed(line, format!("invalid score {s:?}")))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(KnnError::malformed(line, format!("non-finite score {s:?}")))
    }
}

/// Decodes one `item:score` token of a user line.
fn parse_item_token(token: &str, line: usize) -> KnnResult<(ItemId, f64)> {
    let token = token.trim_matches(',');
    let (item, score) = token
        .split_once(':')
        .ok_or_else(|| KnnError::malformed(line, format!("token {token:?} lacks ':'")))?;
    Ok((parse_id(item, line, "item")?, parse_score(score, line)?))
}

/// Decodes a user line. Bad item tokens are skipped and counted in the second
/// element of the result.
pub fn parse_user_line(text: &str, line: usize) -> KnnResult<(UserRatings, usize)> {
    let mut tokens = text.split_whitespace();
    let user = tokens
        .next()
        .ok_or_else(|| KnnError::malformed(line, "empty user line"))?;
    let mut ratings = UserRatings::new(parse_id(user, line, "user")?);

    let mut skipped = 0;
    for token in tokens {
        // a lone comma between tokens is only a separator
        if token.trim_matches(',').is_empty() {
            continue;
        }
        match parse_item_token(token, line) {
            Ok((item, score)) => ratings.insert(item, score),
            Err(e) => {
                warn!("{e}; token skipped");
                skipped += 1;
            }
        }
    }
    Ok((ratings, skipped))
}

/// Decodes a block header `userId|count`.
pub fn parse_block_header(text: &str, line: usize) -> KnnResult<(UserId, usize)> {
    let (user, count) = text
        .split_once('|')
        .ok_or_else(|| KnnError::malformed(line, "block header lacks '|'"))?;
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|_| KnnError::malformed(line, format!("invalid rating count {count:?}")))?;
    Ok((parse_id(user, line, "user")?, count))
}

/// Decodes a block rating line `itemId score [extra fields]`.
pub fn parse_block_rating(text: &str, user: UserId, line: usize) -> KnnResult<Rating> {
    let mut fields = text.split_whitespace();
    let (Some(item), Some(score)) = (fields.next(), fields.next()) else {
        return Err(KnnError::malformed(line, "rating line needs item and score"));
    };
    Ok(Rating::new(
        user,
        parse_id(item, line, "item")?,
        parse_score(score, line)?,
    ))
}

/// Streaming rating decoder over any buffered reader.
///
/// Yields `Ok(Rating)` for every decoded rating and `Err` only for I/O failures.
pub struct RatingReader<R: BufRead> {
    lines: std::io::Lines<R>,
    format: RatingFormat,
    line_no: usize,
    // user of the open block and ratings still expected
    block: Option<(UserId, usize)>,
    pending: VecDeque<Rating>,
    stats: ReadStats,
}

impl<R: BufRead> RatingReader<R> {
    pub fn new(reader: R, format: RatingFormat) -> Self {
        Self {
            lines: reader.lines(),
            format,
            line_no: 0,
            block: None,
            pending: VecDeque::new(),
            stats: ReadStats::default(),
        }
    }

    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    fn skip(&mut self, err: KnnError) {
        warn!("{err}; record skipped");
        self.stats.skipped += 1;
    }

    fn feed_user_line(&mut self, text: &str) {
        match parse_user_line(text, self.line_no) {
            Ok((ratings, bad_tokens)) => {
                self.stats.skipped += bad_tokens;
                self.stats.records += ratings.len();
                self.pending.extend(ratings.ratings());
            }
            Err(e) => self.skip(e),
        }
    }

    fn feed_block_line(&mut self, text: &str) {
        if text.contains('|') {
            match parse_block_header(text, self.line_no) {
                Ok((user, count)) => self.block = Some((user, count)),
                Err(e) => {
                    self.block = None;
                    self.skip(e);
                }
            }
            return;
        }

        match self.block {
            Some((user, remaining)) if remaining > 0 => {
                self.block = Some((user, remaining - 1));
                match parse_block_rating(text, user, self.line_no) {
                    Ok(rating) => {
                        self.stats.records += 1;
                        self.pending.push_back(rating);
                    }
                    Err(e) => self.skip(e),
                }
            }
            _ => self.skip(KnnError::malformed(
                self.line_no,
                "rating line outside of a user block",
            )),
        }
    }
}

impl<R: BufRead> Iterator for RatingReader<R> {
    type Item = KnnResult<Rating>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(rating) = self.pending.pop_front() {
                return Some(Ok(rating));
            }
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            match self.format {
                RatingFormat::UserLines => self.feed_user_line(text),
                RatingFormat::Blocks => self.feed_block_line(text),
            }
        }
    }
}

/// Reads every rating from `reader`.
pub fn read_ratings<R: BufRead>(
    reader: R,
    format: RatingFormat,
) -> KnnResult<(Vec<Rating>, ReadStats)> {
    let mut rr = RatingReader::new(reader, format);
    let ratings = rr.by_ref().collect::<KnnResult<Vec<_>>>()?;
    let stats = rr.stats();
    debug!(
        "Read {} ratings ({} malformed records skipped)",
        stats.records, stats.skipped
    );
    Ok((ratings, stats))
}

/// `(A, B)<TAB>score`
pub fn format_pair_line(pair: &SimilarityPair) -> String {
    format!("({}, {})\t{}", pair.item_a, pair.item_b, pair.score)
}

pub fn parse_pair_line(text: &str, line: usize) -> KnnResult<SimilarityPair> {
    let text = text.trim();
    let close = text
        .find(')')
        .ok_or_else(|| KnnError::malformed(line, "pair line lacks ')'"))?;
    let (ids, rest) = text.split_at(close + 1);
    let ids = ids.trim_start_matches('(').trim_end_matches(')');
    let (a, b) = ids
        .split_once(',')
        .ok_or_else(|| KnnError::malformed(line, "pair needs two item ids"))?;
    let a = parse_id(a, line, "item")?;
    let b = parse_id(b, line, "item")?;
    if a == b {
        return Err(KnnError::malformed(line, format!("self pair ({a}, {b})")));
    }
    let score = parse_score(rest, line)?;
    Ok(SimilarityPair::new(a, b, score))
}

/// Reads similarity pair lines, skipping malformed ones.
pub fn read_pairs<R: BufRead>(reader: R) -> KnnResult<(Vec<SimilarityPair>, ReadStats)> {
    let mut stats = ReadStats::default();
    let mut pairs = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_pair_line(&line, i + 1) {
            Ok(pair) => {
                stats.records += 1;
                pairs.push(pair);
            }
            Err(e) => {
                warn!("{e}; pair skipped");
                stats.skipped += 1;
            }
        }
    }
    Ok((pairs, stats))
}

pub fn write_pairs<W: Write>(mut w: W, pairs: &[SimilarityPair]) -> KnnResult<()> {
    for pair in pairs {
        writeln!(w, "{}", format_pair_line(pair))?;
    }
    w.flush()?;
    Ok(())
}

/// `item<TAB>n1:s1,n2:s2`; the list part is empty for an item without neighbours.
pub fn format_neighbor_row(item: ItemId, list: &NeighborList) -> String {
    format!("{item}\t{list}")
}

pub fn write_neighbor_rows<W: Write>(
    mut w: W,
    neighbors: &BTreeMap<ItemId, NeighborList>,
) -> KnnResult<()> {
    for (item, list) in neighbors {
        writeln!(w, "{}", format_neighbor_row(*item, list))?;
    }
    w.flush()?;
    Ok(())
}
