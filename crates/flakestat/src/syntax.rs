//! Shape helpers over tree-sitter Python nodes
//!
//! Shared by the miner (classification) and the instrumenter (operand
//! extraction) so both agree on what a comparison or a call looks like.

use tree_sitter::Node;

/// Named children, skipping comments
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Strip any number of enclosing parentheses
pub fn unwrap_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match named_children(node).first() {
            Some(inner) => node = *inner,
            None => break,
        }
    }
    node
}

/// 1-based line on which `node` starts
pub fn start_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Text of `node` inside `source`
pub fn text<'s>(source: &'s str, node: Node<'_>) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

/// A `left op right [op right ...]` chain
#[derive(Debug, Clone)]
pub struct Comparison<'t> {
    /// Operands in source order
    pub operands: Vec<Node<'t>>,
    /// Operator tokens in source order (`<`, `==`, `not in`, ...)
    pub operators: Vec<&'static str>,
}

impl<'t> Comparison<'t> {
    /// Decompose a `comparison_operator` node
    pub fn of(node: Node<'t>) -> Option<Self> {
        if node.kind() != "comparison_operator" {
            return None;
        }
        let mut cursor = node.walk();
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        for child in node.children(&mut cursor) {
            if child.is_named() {
                if child.kind() != "comment" {
                    operands.push(child);
                }
            } else {
                operators.push(child.kind());
            }
        }
        (operands.len() >= 2).then_some(Self {
            operands,
            operators,
        })
    }

    /// The single operator of a two-operand comparison
    pub fn single_operator(&self) -> Option<&'static str> {
        match self.operators.as_slice() {
            [op] => Some(*op),
            _ => None,
        }
    }

    /// Left operand
    pub fn left(&self) -> Node<'t> {
        self.operands[0]
    }

    /// First comparator
    pub fn right(&self) -> Node<'t> {
        self.operands[1]
    }
}

/// One argument of a call
#[derive(Debug, Clone, Copy)]
pub enum Argument<'t> {
    /// Positional expression
    Positional(Node<'t>),
    /// `name=value`
    Keyword {
        /// Keyword identifier
        name: Node<'t>,
        /// Value expression
        value: Node<'t>,
    },
    /// `*xs` or `**kw`
    Splat(Node<'t>),
}

/// A call expression broken into callee and arguments
#[derive(Debug, Clone)]
pub struct Call<'t> {
    /// Callee expression
    pub function: Node<'t>,
    /// Arguments in source order; `None` for a generator-expression argument
    pub arguments: Option<Vec<Argument<'t>>>,
}

impl<'t> Call<'t> {
    /// Decompose a `call` node
    pub fn of(node: Node<'t>) -> Option<Self> {
        if node.kind() != "call" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        let args_node = node.child_by_field_name("arguments")?;
        if args_node.kind() != "argument_list" {
            return Some(Self {
                function,
                arguments: None,
            });
        }

        let arguments = named_children(args_node)
            .into_iter()
            .map(|arg| match arg.kind() {
                "keyword_argument" => match (
                    arg.child_by_field_name("name"),
                    arg.child_by_field_name("value"),
                ) {
                    (Some(name), Some(value)) => Argument::Keyword { name, value },
                    _ => Argument::Splat(arg),
                },
                "list_splat" | "dictionary_splat" | "parenthesized_list_splat" => {
                    Argument::Splat(arg)
                }
                _ => Argument::Positional(arg),
            })
            .collect();

        Some(Self {
            function,
            arguments: Some(arguments),
        })
    }

    /// Bare name (`f`) or trailing attribute (`x.y.f`) of the callee
    pub fn name<'s>(&self, source: &'s str) -> Option<&'s str> {
        match self.function.kind() {
            "identifier" => Some(text(source, self.function)),
            "attribute" => self
                .function
                .child_by_field_name("attribute")
                .map(|attr| text(source, attr)),
            _ => None,
        }
    }

    /// Object the callee attribute hangs off (`x.y` in `x.y.f`)
    pub fn owner(&self) -> Option<Node<'t>> {
        if self.function.kind() == "attribute" {
            self.function.child_by_field_name("object")
        } else {
            None
        }
    }

    /// Positional arguments up to the first splat
    pub fn positional(&self) -> Vec<Node<'t>> {
        let mut out = Vec::new();
        for arg in self.arguments.iter().flatten() {
            match arg {
                Argument::Positional(node) => out.push(*node),
                Argument::Splat(_) => break,
                Argument::Keyword { .. } => {}
            }
        }
        out
    }

    /// Value of the last keyword argument whose name is in `names`
    pub fn keyword(&self, source: &str, names: &[&str]) -> Option<Node<'t>> {
        self.arguments
            .iter()
            .flatten()
            .filter_map(|arg| match arg {
                Argument::Keyword { name, value } if names.contains(&text(source, *name)) => {
                    Some(*value)
                }
                _ => None,
            })
            .last()
    }
}

/// Literal constant: number, string, bool, `None`, or a signed numeric literal
pub fn is_literal_constant(node: Node<'_>) -> bool {
    let node = unwrap_parens(node);
    match node.kind() {
        "integer" | "float" | "true" | "false" | "none" | "concatenated_string" => true,
        "string" => !named_children(node)
            .iter()
            .any(|child| child.kind() == "interpolation"),
        "unary_operator" => {
            let signed = node
                .child_by_field_name("operator")
                .is_some_and(|op| matches!(op.kind(), "-" | "+"));
            signed
                && node
                    .child_by_field_name("argument")
                    .is_some_and(|arg| matches!(arg.kind(), "integer" | "float"))
        }
        _ => false,
    }
}
