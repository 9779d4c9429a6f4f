//! Reads ratings in the `userId|count` block layout, runs the item kNN pipeline and
//! prints the similarity pair lines followed by the neighbour rows.
//!
//! Run with `RUST_LOG=info cargo run --example rating_pipeline`.

use std::io::{self, Cursor};

use corate::builder::ItemKnnBuilder;
use corate::records::{read_ratings, RatingFormat};
use corate::threshold::ThresholdPolicy;
use corate::KnnResult;

const SAMPLE: &str = "\
1|4
507696\t90\t3705\t21:41:00
249185\t70\t3705\t21:41:00
7216\t50\t3705\t21:43:00
1010\t0\t3706\t13:20:00
2|4
507696\t70\t3709\t09:12:00
249185\t50\t3709\t09:13:00
7216\t80\t3709\t09:15:00
1010\t10\t3710\t18:02:00
3|3
507696\t100\t3712\t22:01:00
249185\t90\t3712\t22:03:00
1010\t30\t3712\t22:04:00
4|3
249185\t30\t3715\t07:30:00
7216\t90\t3715\t07:31:00
1010\t70\t3715\t07:33:00
";

fn main() -> KnnResult<()> {
    env_logger::init();

    let (ratings, stats) = read_ratings(Cursor::new(SAMPLE), RatingFormat::Blocks)?;
    println!(
        "# {} ratings read, {} malformed records skipped",
        stats.records, stats.skipped
    );

    for policy in [ThresholdPolicy::default(), ThresholdPolicy::Median] {
        let knn = ItemKnnBuilder::new()
            .with_threshold_policy(policy)
            .build(ratings.clone())?;

        println!(
            "\n# policy {} -> threshold {:.4}: {} pairs over {} items",
            policy,
            knn.threshold(),
            knn.pairs().len(),
            knn.n_items
        );
        println!("## pairs");
        knn.write_pairs(io::stdout().lock())?;
        println!("## neighbours");
        knn.write_neighbor_rows(io::stdout().lock())?;
    }
    Ok(())
}
