//! Operator-precedence parser over a flat token stream.
//!
//! This is not recursive descent: the token list becomes one big transient
//! group, and a fixed sequence of in-place structural passes rewrites it —
//! parenthesization, object folding, `in` collapse, unary wrap, function
//! calls, then binary folds from multiplicative up to conjunction. The final
//! flatten converts the surviving structure into a single [`Operation`]; no
//! transient group ever escapes.

use crate::ast::{ObjectOperand, Operand, Operation, Operator, SliceOperand, Token, TokenKind};
use crate::error::Error;
use crate::lexer::Lexer;

/// Drives the lexer to exhaustion and converts the token list into an
/// [`Operation`] tree.
pub struct Parser {
    tokens: Vec<Token>,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, Error> {
        let mut lexer = Lexer::new(input)?;
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(Parser { tokens })
    }

    /// Tokens as produced by the lexer, in order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Runs the structural passes and yields the finished tree.
    pub fn into_operation(self) -> Result<Operation, Error> {
        let mut root = Group {
            children: self.tokens.into_iter().map(Node::Token).collect(),
        };
        root.parenthesize();
        root.fold_objects()?;
        root.fold_in()?;
        root.fold_unary()?;
        root.fold_calls()?;
        root.fold_binary(TokenKind::is_multiplicative)?;
        root.fold_binary(TokenKind::is_additive)?;
        root.fold_binary(TokenKind::is_relational)?;
        root.fold_binary(TokenKind::is_equality)?;
        root.fold_binary(TokenKind::is_conjunction)?;
        let operation = root.flatten_root()?;
        tracing::debug!(operator = %operation.operator, "parsed filter expression");
        Ok(operation)
    }
}

/// Transient parse node. Only [`Operand`] shapes survive flattening.
enum Node {
    Token(Token),
    Group(Group),
    Op(OpNode),
    Slice(Vec<Node>),
    Object(String),
}

impl Node {
    fn token_kind(&self) -> Option<TokenKind> {
        match self {
            Node::Token(t) => Some(t.kind),
            _ => None,
        }
    }
}

/// An operation under construction; operands may still be groups.
struct OpNode {
    operator: TokenKind,
    operands: Vec<Node>,
}

/// Mutable ordered list of operands, the parser's working structure.
struct Group {
    children: Vec<Node>,
}

fn strip_commas(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|n| n.token_kind() != Some(TokenKind::Comma))
        .collect()
}

impl Group {
    /// Pass 1: every `(…)` range becomes a nested group. Runs first, while
    /// all children are still raw tokens. An unmatched `(` is left in place
    /// and surfaces later as a flatten error.
    fn parenthesize(&mut self) {
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].token_kind() == Some(TokenKind::OpenParens) {
                let Some((end, nested)) = self.find_close_parens(i) else {
                    return;
                };
                let mut inner: Vec<Node> = self.children.drain(i..=end).collect();
                inner.pop();
                inner.remove(0);
                let mut group = Group { children: inner };
                if nested {
                    group.parenthesize();
                }
                self.children.insert(i, Node::Group(group));
            }
            i += 1;
        }
    }

    fn find_close_parens(&self, start: usize) -> Option<(usize, bool)> {
        let mut depth = 1usize;
        let mut nested = false;
        for (i, child) in self.children.iter().enumerate().skip(start + 1) {
            match child.token_kind() {
                Some(TokenKind::OpenParens) => {
                    depth += 1;
                    nested = true;
                }
                Some(TokenKind::CloseParens) => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((i, nested));
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Pass 2: `{…}` spans collapse into a verbatim object literal. The JSON
    /// text is reassembled from the raw token texts; validity is deferred to
    /// [`ObjectOperand::get_data`].
    fn fold_objects(&mut self) -> Result<(), Error> {
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].token_kind() == Some(TokenKind::OpenCurlyBrace) {
                let mut text = String::new();
                let mut depth = 0usize;
                let mut end = None;
                for (j, child) in self.children.iter().enumerate().skip(i) {
                    let Node::Token(t) = child else { continue };
                    text.push_str(&t.text);
                    match t.kind {
                        TokenKind::OpenCurlyBrace => depth += 1,
                        TokenKind::CloseCurlyBrace => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| Error::parsing("unterminated object literal"))?;
                self.children.splice(i..=end, [Node::Object(text)]);
            } else if let Node::Group(group) = &mut self.children[i] {
                group.fold_objects()?;
            }
            i += 1;
        }
        Ok(())
    }

    /// Pass 3: `x in (…)` / `x in […]` collapses into an `In` operation with
    /// an identifier and a comma-stripped slice.
    fn fold_in(&mut self) -> Result<(), Error> {
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].token_kind() == Some(TokenKind::In) {
                self.collapse_in(i)?;
                // The new operation sits at i-1; the scan resumes at the
                // element that now follows it.
            } else {
                if let Node::Group(group) = &mut self.children[i] {
                    group.fold_in()?;
                }
                i += 1;
            }
        }
        Ok(())
    }

    fn collapse_in(&mut self, i: usize) -> Result<(), Error> {
        if i == 0 || i + 1 >= self.children.len() {
            return Err(Error::parsing("expected item before and after operator"));
        }
        if matches!(self.children[i + 1], Node::Group(_)) {
            let mut removed: Vec<Node> = self.children.splice(i - 1..=i + 1, []).collect();
            let Some(Node::Group(mut group)) = removed.pop() else {
                unreachable!()
            };
            let prev = removed.remove(0);
            group.fold_in()?;
            let slice = Node::Slice(strip_commas(group.children));
            self.children.insert(
                i - 1,
                Node::Op(OpNode {
                    operator: TokenKind::In,
                    operands: vec![prev, slice],
                }),
            );
            return Ok(());
        }
        if self.children[i + 1].token_kind() == Some(TokenKind::OpenSquareBracket) {
            let close = self.children[i + 2..]
                .iter()
                .position(|n| n.token_kind() == Some(TokenKind::CloseSquareBracket))
                .map(|offset| i + 2 + offset)
                .ok_or_else(|| Error::parsing("expected close square bracket after in"))?;
            let mut removed: Vec<Node> = self.children.splice(i - 1..=close, []).collect();
            let prev = removed.remove(0);
            removed.remove(0); // `in`
            removed.remove(0); // `[`
            removed.pop(); // `]`
            let slice = Node::Slice(strip_commas(removed));
            self.children.insert(
                i - 1,
                Node::Op(OpNode {
                    operator: TokenKind::In,
                    operands: vec![prev, slice],
                }),
            );
            return Ok(());
        }
        match &self.children[i + 1] {
            Node::Token(t) => Err(Error::parsing(format!(
                "expected open square bracket after in, found {:?}",
                t.text
            ))),
            _ => Err(Error::parsing("expected collection after in")),
        }
    }

    /// Pass 4: `not` wraps everything to its right. A bare token operand is
    /// lifted into a fresh group first so the operator binds to the full
    /// trailing sub-expression.
    fn fold_unary(&mut self) -> Result<(), Error> {
        let mut i = 0;
        while i < self.children.len() {
            match self.children[i].token_kind() {
                Some(kind) if kind.is_unary() => {
                    if i + 1 >= self.children.len() {
                        return Err(Error::parsing("expected operand after unary operator"));
                    }
                    let mut rest: Vec<Node> = self.children.drain(i..).collect();
                    rest.remove(0);
                    let next = rest.remove(0);
                    let tail = rest;
                    let wrapped = match next {
                        Node::Group(mut group) => {
                            group.fold_unary()?;
                            group.children.extend(tail);
                            Node::Group(group)
                        }
                        Node::Op(mut op) => {
                            op.fold_unary()?;
                            op.operands.extend(tail);
                            Node::Op(op)
                        }
                        Node::Token(token) => {
                            let mut group = Group {
                                children: vec![Node::Token(token)],
                            };
                            group.children.extend(tail);
                            group.fold_unary()?;
                            Node::Group(group)
                        }
                        other => {
                            self.children.push(Node::Op(OpNode {
                                operator: kind,
                                operands: vec![other],
                            }));
                            self.children.extend(tail);
                            i += 1;
                            continue;
                        }
                    };
                    self.children.push(Node::Op(OpNode {
                        operator: kind,
                        operands: vec![wrapped],
                    }));
                    i += 1;
                }
                Some(_) => i += 1,
                None => {
                    match &mut self.children[i] {
                        Node::Group(group) => group.fold_unary()?,
                        Node::Op(op) => op.fold_unary()?,
                        _ => {}
                    }
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// Pass 5: a function-name token swallows the argument group produced by
    /// pass 1; bracketed literals inside become slices and commas disappear.
    fn fold_calls(&mut self) -> Result<(), Error> {
        let mut i = 0;
        while i < self.children.len() {
            match self.children[i].token_kind() {
                Some(kind) if kind.has_parameters() => {
                    if i + 1 >= self.children.len()
                        || !matches!(self.children[i + 1], Node::Group(_))
                    {
                        return Err(Error::parsing(format!(
                            "expected argument group after {}",
                            kind
                        )));
                    }
                    let mut removed: Vec<Node> = self.children.splice(i..=i + 1, []).collect();
                    let Some(Node::Group(mut group)) = removed.pop() else {
                        unreachable!()
                    };
                    group.fold_calls()?;
                    group.create_slices();
                    group.remove_commas();
                    self.children.insert(
                        i,
                        Node::Op(OpNode {
                            operator: kind,
                            operands: vec![Node::Group(group)],
                        }),
                    );
                    i += 1;
                }
                Some(_) => i += 1,
                None => {
                    match &mut self.children[i] {
                        Node::Group(group) => group.fold_calls()?,
                        Node::Op(op) => op.fold_calls()?,
                        _ => {}
                    }
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// Converts `[…]` token runs inside an argument list into slices.
    fn create_slices(&mut self) {
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].token_kind() == Some(TokenKind::OpenSquareBracket) {
                let Some(close) = self.children[i + 1..]
                    .iter()
                    .position(|n| n.token_kind() == Some(TokenKind::CloseSquareBracket))
                    .map(|offset| i + 1 + offset)
                else {
                    i += 1;
                    continue;
                };
                let mut removed: Vec<Node> = self.children.splice(i..=close, []).collect();
                removed.remove(0);
                removed.pop();
                self.children.insert(i, Node::Slice(strip_commas(removed)));
            }
            i += 1;
        }
    }

    fn remove_commas(&mut self) {
        self.children
            .retain(|n| n.token_kind() != Some(TokenKind::Comma));
    }

    /// Passes 6a-6e: one left-to-right fold per precedence tier. After each
    /// rewrite the scan resumes at the new node's successor, so chains fold
    /// left-associatively.
    fn fold_binary(&mut self, matches_tier: fn(TokenKind) -> bool) -> Result<(), Error> {
        let mut i = 0;
        while i < self.children.len() {
            match self.children[i].token_kind() {
                Some(kind) if matches_tier(kind) => {
                    if i == 0 || i + 1 >= self.children.len() {
                        return Err(Error::parsing("expected item before and after operator"));
                    }
                    let mut removed: Vec<Node> = self.children.splice(i - 1..=i + 1, []).collect();
                    let next = removed.pop().expect("splice returned three nodes");
                    removed.pop();
                    let prev = removed.pop().expect("splice returned three nodes");
                    self.children.insert(
                        i - 1,
                        Node::Op(OpNode {
                            operator: kind,
                            operands: vec![prev, next],
                        }),
                    );
                    // i now addresses the node after the fold; don't advance.
                }
                Some(_) => i += 1,
                None => {
                    match &mut self.children[i] {
                        Node::Group(group) => group.fold_binary(matches_tier)?,
                        Node::Op(op) => op.fold_binary(matches_tier)?,
                        _ => {}
                    }
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// Pass 7: the root group must hold exactly one operand; unwrap it into
    /// the final tree. A bare literal root becomes a nullary operation.
    fn flatten_root(mut self) -> Result<Operation, Error> {
        if self.children.len() != 1 {
            return Err(Error::parsing("more than one child"));
        }
        match self.children.pop().expect("checked length") {
            Node::Op(op) => op.into_operation(),
            Node::Token(t) => Ok(Operation::new(Operator::Op(t.kind), vec![])),
            Node::Group(group) => group.flatten_root(),
            _ => Err(Error::parsing("unexpected node at expression root")),
        }
    }
}

impl OpNode {
    fn fold_unary(&mut self) -> Result<(), Error> {
        for operand in &mut self.operands {
            match operand {
                Node::Group(group) => group.fold_unary()?,
                Node::Op(op) => op.fold_unary()?,
                _ => {}
            }
        }
        Ok(())
    }

    fn fold_calls(&mut self) -> Result<(), Error> {
        for operand in &mut self.operands {
            match operand {
                Node::Group(group) => group.fold_calls()?,
                Node::Op(op) => op.fold_calls()?,
                _ => {}
            }
        }
        Ok(())
    }

    fn fold_binary(&mut self, matches_tier: fn(TokenKind) -> bool) -> Result<(), Error> {
        for operand in &mut self.operands {
            match operand {
                Node::Group(group) => group.fold_binary(matches_tier)?,
                Node::Op(op) => op.fold_binary(matches_tier)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Converts into a final [`Operation`]. A function-call operator splices
    /// its argument group into the operand list; other operators unwrap
    /// single-child groups (a lone token degrades to a nullary operation).
    fn into_operation(self) -> Result<Operation, Error> {
        let is_call = self.operator.has_parameters();
        let mut operands = Vec::new();
        for child in self.operands {
            match child {
                Node::Group(group) if is_call || group.children.len() != 1 => {
                    for inner in group.children {
                        operands.push(node_to_operand(inner)?);
                    }
                }
                Node::Group(group) => {
                    let single = group.children.into_iter().next().expect("checked length");
                    operands.push(unwrap_single(single)?);
                }
                other => operands.push(node_to_operand(other)?),
            }
        }
        Ok(Operation::new(self.operator, operands))
    }
}

fn node_to_operand(node: Node) -> Result<Operand, Error> {
    match node {
        Node::Token(t) => Ok(Operand::Token(t)),
        Node::Op(op) => Ok(Operand::Operation(Box::new(op.into_operation()?))),
        Node::Slice(items) => {
            let items = items
                .into_iter()
                .map(node_to_operand)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Operand::Slice(SliceOperand { items }))
        }
        Node::Object(properties) => Ok(Operand::Object(ObjectOperand { properties })),
        Node::Group(group) => {
            if group.children.len() == 1 {
                unwrap_single(group.children.into_iter().next().expect("checked length"))
            } else {
                Err(Error::parsing("more than one child"))
            }
        }
    }
}

/// A group holding exactly one child reduces to an operation-shaped operand.
fn unwrap_single(node: Node) -> Result<Operand, Error> {
    match node {
        Node::Op(op) => Ok(Operand::Operation(Box::new(op.into_operation()?))),
        Node::Token(t) => Ok(Operand::Operation(Box::new(Operation::new(
            Operator::Op(t.kind),
            vec![],
        )))),
        Node::Group(group) => node_to_operand(Node::Group(group)),
        _ => Err(Error::parsing("unexpected node in expression")),
    }
}
