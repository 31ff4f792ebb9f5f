//! STREAM-style bandwidth loops and an array swap instrumented with a
//! `Recorder`.
//!
//! Counts the events named in `PERFSPAN_EVENTS` (falling back to
//! `cycles|cache-misses`) around each kernel, discards the warm-up run, and
//! prints the per-key multi-run averages:
//!
//! ```text
//! PERFSPAN_EVENTS="cycles|L1-dcache-load-misses" cargo run --example stream
//! ```

use rayon::prelude::*;

use perfspan::{report, Config, Error, Recorder};

const SIZE: usize = 20_000_000;
const NTIMES: usize = 10;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::var_os(perfspan::events::EVENTS_ENV) {
        Some(_) => Config::from_env(),
        None => Config::with_events(["cycles", "cache-misses"]),
    };
    let mut recorder = Recorder::new(config)?;

    println!(
        "stream: {} elements/array, {} runs ({} threads), averaging all but the first",
        SIZE,
        NTIMES,
        recorder.threads()
    );

    let mut x = vec![1.0f32; SIZE];
    let mut y = vec![2.0f32; SIZE];
    let mut z = vec![0.0f32; SIZE];
    let scalar = 3.0f32;

    let mut a: Vec<u32> = (0..SIZE as u32).collect();
    let mut b: Vec<u32> = (0..SIZE as u32).rev().collect();

    for run in 0..NTIMES {
        // The first pass warms caches and the page tables; skip recording it.
        let record = run > 0;

        if record {
            recorder.start("copy")?;
        }
        z.par_iter_mut().zip(&x).for_each(|(z, x)| *z = *x);
        if record {
            recorder.stop()?;
            recorder.start("scale")?;
        }
        y.par_iter_mut().zip(&z).for_each(|(y, z)| *y = scalar * *z);
        if record {
            recorder.stop()?;
            recorder.start("add")?;
        }
        z.par_iter_mut()
            .zip(&x)
            .zip(&y)
            .for_each(|((z, x), y)| *z = *x + *y);
        if record {
            recorder.stop()?;
            recorder.start("triad")?;
        }
        x.par_iter_mut()
            .zip(&y)
            .zip(&z)
            .for_each(|((x, y), z)| *x = *y + scalar * *z);
        if record {
            recorder.stop()?;
            recorder.start("swap")?;
        }
        a.par_iter_mut()
            .zip(&mut b)
            .for_each(|(a, b)| std::mem::swap(a, b));
        if record {
            recorder.stop()?;
        }
    }

    report::render_summaries(recorder.log(), &mut std::io::stdout())?;
    Ok(())
}
