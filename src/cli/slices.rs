// src/cli/slices.rs — `rlm-refine slices`: show the slice plan for a context

use super::run::load_context;
use crate::core::slicer::ContextSlicer;
use crate::core::types::{Context, SliceSet};
use crate::infra::config::Config;

pub fn show_slices(context_arg: &str, json: bool, config: &Config) -> anyhow::Result<()> {
    let context = load_context(context_arg)?;
    let slices = ContextSlicer::new((&config.slicing).into()).slice(&context);

    if json {
        println!("{}", serde_json::to_string_pretty(&slices.infos())?);
    } else {
        print!("{}", render_table(&context, &slices));
    }
    Ok(())
}

fn render_table(context: &Context, slices: &SliceSet) -> String {
    let mut out = format!(
        "{} context, size {}, {} slice(s)\n\n",
        context.kind(),
        context.size(),
        slices.len()
    );
    let width = slices
        .iter()
        .map(|s| s.slice_id.chars().count())
        .max()
        .unwrap_or(0)
        .max("SLICE".len());

    out.push_str(&format!("{:<width$}  {:<7}  {:>9}\n", "SLICE", "TYPE", "SIZE"));
    for slice in slices.iter() {
        out.push_str(&format!(
            "{:<width$}  {:<7}  {:>9}\n",
            slice.slice_id,
            slice.content_type(),
            slice.content_size()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::slicer;

    #[test]
    fn test_render_table() {
        let ctx = Context::from_json(serde_json::json!({"alpha": "abc", "b": [1, 2]}));
        let table = render_table(&ctx, &slicer::slice(&ctx));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "mapping context, size 2, 2 slice(s)");
        assert_eq!(lines[2], "SLICE       TYPE          SIZE");
        assert_eq!(lines[3], "dict_alpha  text             3");
        assert!(lines[4].starts_with("dict_b      array"));
    }
}
