use std::borrow::Cow;
use std::default::Default;
use std::fmt::{Display, Formatter};
use std::io::{BufWriter, Write};

use anyhow::Context;
use ptree::print_config::UTF_CHARS;
use ptree::{write_tree_with, PrintConfig, Style, TreeItem};

use crate::error::OptResult;
use crate::operator::DisplayFields;
use crate::plan::{Plan, PlanNode};

struct NodeLabel<'a>(&'a PlanNode);

impl<'a> Display for NodeLabel<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let node = self.0;
        write!(f, "{}", node.operator().id().as_ref())?;
        node.operator().display(f)?;
        write!(f, " rows={:.2} cost={}", node.rows(), node.cost())
    }
}

impl<'a> TreeItem for &'a PlanNode {
    type Child = Self;

    fn write_self<W: Write>(&self, f: &mut W, style: &Style) -> std::io::Result<()> {
        write!(f, "{}", style.paint(NodeLabel(self)))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(
            self.inputs()
                .iter()
                .map(|c| &**c)
                .collect::<Vec<&'a PlanNode>>(),
        )
    }
}

pub fn explain<W: Write>(plan: &Plan, output: &mut W) -> std::io::Result<()> {
    let config = PrintConfig {
        indent: 3,
        characters: UTF_CHARS.into(),
        ..Default::default()
    };
    let root = plan.root();
    write_tree_with(&root.as_ref(), output, &config)
}

pub fn explain_to_string(plan: &Plan) -> OptResult<String> {
    let mut buf = BufWriter::new(Vec::new());
    explain(plan, &mut buf)?;

    let bytes = buf.into_inner()?;
    String::from_utf8(bytes).context("explain output is not utf-8")
}
