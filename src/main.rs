//! qa self-test binary
//!
//! Registers the library's own smoke tests and runs them through the
//! standard command line.
//!
//! ## Usage
//!
//! ```bash
//! # Run everything sequentially
//! qa
//!
//! # Run on four worker processes, only the expect tests
//! qa -c process -w 4 -f '^self:expect'
//!
//! # Table output with debug scheduling logs
//! qa -d --format table
//! ```

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use qa::{
    expect, expect_eq, expect_not, expect_raises_in, expect_some, testcase, Failure, Fixture,
    PluginSet, Registry,
};

const GROUP: &str = "self";

#[derive(Error, Debug)]
#[error("missing key: {0}")]
struct KeyError(i32);

fn lookup(map: &HashMap<i32, i32>, key: i32) -> Result<i32, KeyError> {
    map.get(&key).copied().ok_or(KeyError(key))
}

fn register_self_tests(registry: &Registry) {
    testcase("expect", |_| {
        expect(&true)?;
        expect_raises_in::<Failure, _>(|| expect(&false))?;
        Ok(())
    })
    .group(GROUP)
    .register(registry);

    testcase("expect_not", |_| {
        expect_not(&false)?;
        expect_raises_in::<Failure, _>(|| expect_not(&true))?;
        Ok(())
    })
    .group(GROUP)
    .register(registry);

    testcase("expect_some", |_| {
        expect_some(&Some(false))?;
        expect_some(&Some(true))?;
        expect_some(&Some(0))?;
        expect_some(&Some(()))?;
        expect_raises_in::<Failure, _>(|| expect_some(&None::<i32>))?;
        Ok(())
    })
    .group(GROUP)
    .register(registry);

    let foo = Fixture::new(
        "foo",
        |ctx| {
            ctx.insert("foo", 1_i32);
            Ok(())
        },
        |ctx| {
            ctx.discard("foo");
            Ok(())
        },
    )
    .shared();
    testcase("requires", |ctx| {
        let foo = ctx
            .get::<i32>("foo")
            .ok_or_else(|| anyhow::anyhow!("fixture value foo missing"))?;
        expect_eq(foo, &1)?;
        Ok(())
    })
    .group(GROUP)
    .description("Make sure requires works")
    .require(foo)
    .register(registry);

    testcase("raises", |_| {
        expect_raises_in::<KeyError, _>(|| lookup(&HashMap::new(), 0))?;
        Ok(())
    })
    .group(GROUP)
    .register(registry);
}

#[tokio::main]
async fn main() -> Result<()> {
    let registry: Arc<Registry> = Registry::global();
    register_self_tests(&registry);

    let code = qa::run_main(registry, PluginSet::new()).await?;
    std::process::exit(code);
}
