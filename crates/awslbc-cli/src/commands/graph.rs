//! Graph command - print what the component declares

use clap::Args;

use super::compose;
use crate::config::ComponentFlags;
use crate::Result;

/// Print the declared resource tree
#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub component: ComponentFlags,

    /// Print the graph as JSON instead of a tree
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: GraphArgs) -> Result<()> {
    let config = args.component.resolve()?;
    let graph = compose(&config)?.graph();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        print!("{}", graph.render_tree());
    }
    Ok(())
}
