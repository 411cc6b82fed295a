use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use itertools::Itertools;

use crate::conditions::Substitution;
use crate::errors::{ErrorMessageExt, IntoMessageResult, Spanned};
use crate::pddl::input::Input;
use crate::pddl::parser::{self, TypedSymbol, consume_typed_symbols, parse_pddl_domain, parse_pddl_problem};
use crate::pddl::sexpr::{SExpr, parse};
use crate::{
    Action, CompOp, Condition, Domain, Effect, Entity, Event, Fact, FactOptional, FluentExpr, Goal, GoalStack,
    Message, Ontology, Param, Predicate, Problem, Res, SetOfCallbacks, SetOfEvents, SetOfFacts, Sym,
    DerivedPredicate, entities::parse_number,
};

/// Lexical scope used while converting expressions: action/quantifier
/// parameters stacked over the declared objects and constants.
pub(crate) struct Bindings {
    lasts: hashbrown::HashMap<String, BoundTerm>,
    prev: Option<Rc<Bindings>>,
}

#[derive(Clone)]
enum BoundTerm {
    Param(Param),
    Object(Entity),
}

impl Bindings {
    fn base(constants: &crate::SetOfEntities, objects: &crate::SetOfEntities) -> Bindings {
        let mut lasts = hashbrown::HashMap::new();
        for entity in constants.iter().chain(objects.iter()) {
            lasts.insert(entity.value.canonical_string(), BoundTerm::Object(entity.clone()));
        }
        Bindings { lasts, prev: None }
    }

    fn stacked(params: &[Param], prev: &Rc<Bindings>) -> Bindings {
        let mut lasts = hashbrown::HashMap::new();
        for param in params {
            lasts.insert(param.name.canonical_string(), BoundTerm::Param(param.clone()));
        }
        Bindings {
            lasts,
            prev: Some(prev.clone()),
        }
    }

    fn get(&self, name: &str) -> Option<BoundTerm> {
        if let Some(term) = self.lasts.get(name) {
            Some(term.clone())
        } else if let Some(prev) = self.prev.as_ref() {
            prev.get(name)
        } else {
            None
        }
    }
}

struct Ctx<'a> {
    ontology: &'a Ontology,
}

/// Operand of an equality or comparison.
enum Term {
    /// A fluent read; the fact carries a wildcard value.
    Fluent(Fact),
    Ent(Entity),
    Num(crate::RealValue),
}

fn resolve_atom(atom: &Sym, bindings: &Bindings) -> Res<Entity> {
    match bindings.get(atom.canonical_str()) {
        Some(BoundTerm::Param(param)) => Ok(param.to_entity()),
        Some(BoundTerm::Object(entity)) => Ok(entity),
        None => {
            if atom.canonical_str() == Entity::ANY_VALUE {
                Ok(Entity::any())
            } else if atom.canonical_str() == Entity::UNDEFINED_VALUE {
                Ok(Entity::undefined())
            } else if parse_number(atom.canonical_str()).is_some() {
                Ok(Entity::number(atom.clone()))
            } else if atom.is_variable() {
                Err((&atom).invalid(format!("The parameter `{atom}` is unknown here")))
            } else {
                Err((&atom).invalid(format!("`{atom}` is not a declared object or constant")))
            }
        }
    }
}

/// Parses the application of a Boolean predicate, e.g. `(lock ?e)`.
fn parse_fact_application(sexpr: &SExpr, ctx: &Ctx, bindings: &Bindings) -> Res<Fact> {
    let mut list = sexpr
        .as_list_iter()
        .ok_or_else(|| sexpr.invalid("Expected a predicate application"))?;
    let name = list.pop_atom()?;
    let predicate = ctx.ontology.predicates.name_to_predicate(name).msg()?;
    if predicate.is_fluent() {
        return Err(sexpr.invalid(format!("`{name}` is a fluent and cannot be used without a value")));
    }
    let mut arguments = Vec::with_capacity(list.len());
    for argument in list {
        let atom = argument.as_atom().ok_or_else(|| argument.invalid("Expected an atom"))?;
        arguments.push(resolve_atom(atom, bindings)?);
    }
    Fact::new(predicate, arguments, None, false).msg()
}

/// Parses the application of a fluent, e.g. `(fun1 ?e)`; the returned fact
/// carries a wildcard value.
fn parse_fluent_application(sexpr: &SExpr, ctx: &Ctx, bindings: &Bindings) -> Res<Fact> {
    let mut list = sexpr
        .as_list_iter()
        .ok_or_else(|| sexpr.invalid("Expected a fluent application"))?;
    let name = list.pop_atom()?;
    let predicate = ctx.ontology.predicates.name_to_predicate(name).msg()?;
    if !predicate.is_fluent() {
        return Err(sexpr.invalid(format!("`{name}` is not a fluent")));
    }
    let mut arguments = Vec::with_capacity(list.len());
    for argument in list {
        let atom = argument.as_atom().ok_or_else(|| argument.invalid("Expected an atom"))?;
        arguments.push(resolve_atom(atom, bindings)?);
    }
    Fact::new(predicate, arguments, Some(Entity::any()), false).msg()
}

fn parse_term(sexpr: &SExpr, ctx: &Ctx, bindings: &Bindings) -> Res<Term> {
    match sexpr {
        SExpr::Atom(atom) => {
            if let Some(number) = parse_number(atom.canonical_str()) {
                if bindings.get(atom.canonical_str()).is_none() {
                    return Ok(Term::Num(number));
                }
            }
            Ok(Term::Ent(resolve_atom(atom, bindings)?))
        }
        SExpr::List(_) => Ok(Term::Fluent(parse_fluent_application(sexpr, ctx, bindings)?)),
    }
}

fn term_to_condition(term: Term) -> Condition {
    match term {
        Term::Fluent(fact) => Condition::Fact(FactOptional::positive(fact)),
        Term::Ent(entity) => Condition::Entity(entity),
        Term::Num(number) => Condition::Number(number),
    }
}

/// Sets a fluent value, checking it against the declared fluent type.
fn with_fluent_value(mut fact: Fact, value: Entity, at: &SExpr) -> Res<Fact> {
    if let (Some(expected), Some(actual)) = (&fact.predicate().value_type, &value.tpe) {
        if !(value.is_any() || value.is_undefined()) && !actual.is_a(expected) {
            return Err(at.invalid(format!(
                "value `{}` is not compatible with the fluent type `{}`",
                value.value, expected
            )));
        }
    }
    fact.set_value(Some(value));
    Ok(fact)
}

fn parse_equality(lhs: &SExpr, rhs: &SExpr, at: &SExpr, ctx: &Ctx, bindings: &Bindings) -> Res<Condition> {
    let left = parse_term(lhs, ctx, bindings)?;
    let right = parse_term(rhs, ctx, bindings)?;
    match (left, right) {
        (Term::Fluent(fact), Term::Ent(entity)) | (Term::Ent(entity), Term::Fluent(fact)) => {
            let fact = with_fluent_value(fact, entity, at)?;
            Ok(Condition::Fact(FactOptional::positive(fact)))
        }
        (Term::Fluent(fact), Term::Num(number)) | (Term::Num(number), Term::Fluent(fact)) => {
            let fact = with_fluent_value(fact, Entity::from_number(number), at)?;
            Ok(Condition::Fact(FactOptional::positive(fact)))
        }
        (left, right) => Ok(Condition::Compare(
            CompOp::Eq,
            Box::new(term_to_condition(left)),
            Box::new(term_to_condition(right)),
        )),
    }
}

fn parse_var_list(vars: &SExpr, ctx: &Ctx) -> Res<Vec<Param>> {
    let mut vars = vars
        .as_list_iter()
        .ok_or_else(|| vars.invalid("expected a variable list"))?;
    let vars = consume_typed_symbols(&mut vars)?;
    typed_symbols_to_params(&vars, ctx.ontology)
}

fn typed_symbols_to_params(symbols: &[TypedSymbol], ontology: &Ontology) -> Res<Vec<Param>> {
    let mut params = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let tpe = match &symbol.tpe {
            Some(tpe) => Some(ontology.types.name_to_type(tpe).msg()?),
            None if ontology.types.is_empty() => None,
            None => return Err((&symbol.symbol).invalid(format!("parameter `{}` must declare a type", symbol.symbol))),
        };
        params.push(Param::new(symbol.symbol.clone(), tpe));
    }
    Ok(params)
}

fn quantified<F>(vars: Vec<Param>, body: Condition, wrap: F) -> Condition
where
    F: Fn(Param, Box<Condition>) -> Condition,
{
    let mut condition = body;
    for var in vars.into_iter().rev() {
        condition = wrap(var, Box::new(condition));
    }
    condition
}

fn parse_condition(sexpr: &SExpr, ctx: &Ctx, bindings: &Rc<Bindings>) -> Res<Condition> {
    if let Some(conjuncts) = sexpr.as_application("and") {
        let items: Vec<Condition> = conjuncts
            .iter()
            .map(|c| parse_condition(c, ctx, bindings))
            .try_collect()?;
        return Ok(Condition::and(items));
    }
    if let Some(disjuncts) = sexpr.as_application("or") {
        let items: Vec<Condition> = disjuncts
            .iter()
            .map(|c| parse_condition(c, ctx, bindings))
            .try_collect()?;
        return Ok(Condition::Or(items));
    }
    if let Some([inner]) = sexpr.as_application("not") {
        return match parse_condition(inner, ctx, bindings)? {
            Condition::Fact(optfact) => Ok(Condition::Fact(optfact.inverted())),
            other => Ok(Condition::Not(Box::new(other))),
        };
    }
    if let Some([antecedent, consequent]) = sexpr.as_application("imply") {
        return Ok(Condition::Imply(
            Box::new(parse_condition(antecedent, ctx, bindings)?),
            Box::new(parse_condition(consequent, ctx, bindings)?),
        ));
    }
    for (keyword, wrap) in [
        ("forall", Condition::Forall as fn(Param, Box<Condition>) -> Condition),
        ("exists", Condition::Exists as fn(Param, Box<Condition>) -> Condition),
    ] {
        if let Some([vars, body]) = sexpr.as_application(keyword) {
            let vars = parse_var_list(vars, ctx)?;
            let bindings = Rc::new(Bindings::stacked(&vars, bindings));
            let body = parse_condition(body, ctx, &bindings)?;
            return Ok(quantified(vars, body, wrap));
        }
    }
    if sexpr.as_application("when").is_some() {
        return Err(sexpr.invalid("`when` is an effect-only construct and cannot appear in a condition"));
    }
    if let Some([lhs, rhs]) = sexpr.as_application("=") {
        return parse_equality(lhs, rhs, sexpr, ctx, bindings);
    }
    for (keyword, op) in [("<", CompOp::Lt), ("<=", CompOp::Leq), (">", CompOp::Gt), (">=", CompOp::Geq)] {
        if let Some([lhs, rhs]) = sexpr.as_application(keyword) {
            let lhs = term_to_condition(parse_term(lhs, ctx, bindings)?);
            let rhs = term_to_condition(parse_term(rhs, ctx, bindings)?);
            return Ok(Condition::Compare(op, Box::new(lhs), Box::new(rhs)));
        }
    }

    // a predicate or derived-predicate application
    let mut list = sexpr
        .as_list_iter()
        .ok_or_else(|| sexpr.invalid("Expected a condition"))?;
    let name = list.pop_atom()?;
    if let Some(derived) = ctx.ontology.derived_predicate(name.canonical_str()) {
        let arguments: Vec<&SExpr> = list.collect();
        if arguments.len() != derived.predicate.parameters.len() {
            return Err(sexpr.invalid(format!(
                "`{}` is applied to {} arguments but expects {}",
                name,
                arguments.len(),
                derived.predicate.parameters.len()
            )));
        }
        let mut subst = Substitution::new();
        for (param, argument) in derived.predicate.parameters.iter().zip(arguments) {
            let atom = argument.as_atom().ok_or_else(|| argument.invalid("Expected an atom"))?;
            subst.insert(param.clone(), resolve_atom(atom, bindings)?);
        }
        return Ok(derived.condition.replace_parameters(&subst));
    }
    parse_fact_application(sexpr, ctx, bindings).map(Condition::fact)
}

fn parse_fluent_expr(sexpr: &SExpr, ctx: &Ctx, bindings: &Bindings) -> Res<FluentExpr> {
    match parse_term(sexpr, ctx, bindings)? {
        Term::Fluent(fact) => Ok(FluentExpr::Read(fact)),
        Term::Ent(entity) => Ok(FluentExpr::Entity(entity)),
        Term::Num(number) => Ok(FluentExpr::Number(number)),
    }
}

fn parse_effect(sexpr: &SExpr, ctx: &Ctx, bindings: &Rc<Bindings>) -> Res<Effect> {
    if let Some(items) = sexpr.as_application("and") {
        let items: Vec<Effect> = items.iter().map(|e| parse_effect(e, ctx, bindings)).try_collect()?;
        return Ok(Effect::and(items));
    }
    if let Some([inner]) = sexpr.as_application("not") {
        let fact = parse_fact_application(inner, ctx, bindings)?;
        return Ok(Effect::Delete(fact));
    }
    for keyword in ["assign", "="] {
        if let Some([sv, value]) = sexpr.as_application(keyword) {
            let fact = parse_fluent_application(sv, ctx, bindings)?;
            let value = parse_fluent_expr(value, ctx, bindings)?;
            if let FluentExpr::Entity(entity) = &value {
                with_fluent_value(fact.clone(), entity.clone(), sexpr)?;
            }
            return Ok(Effect::Assign(fact, value));
        }
    }
    for (keyword, build) in [
        ("increase", Effect::Increase as fn(Fact, FluentExpr) -> Effect),
        ("decrease", Effect::Decrease as fn(Fact, FluentExpr) -> Effect),
    ] {
        if let Some([sv, value]) = sexpr.as_application(keyword) {
            let fact = parse_fluent_application(sv, ctx, bindings)?;
            let value = parse_fluent_expr(value, ctx, bindings)?;
            return Ok(build(fact, value));
        }
    }
    if let Some([condition, body]) = sexpr.as_application("when") {
        let condition = parse_condition(condition, ctx, bindings)?;
        let body = parse_effect(body, ctx, bindings)?;
        return Ok(Effect::When(condition, Box::new(body)));
    }
    if let Some([vars, body]) = sexpr.as_application("forall") {
        let vars = parse_var_list(vars, ctx)?;
        let stacked = Rc::new(Bindings::stacked(&vars, bindings));
        let mut effect = parse_effect(body, ctx, &stacked)?;
        for var in vars.into_iter().rev() {
            effect = Effect::Forall(var, Box::new(effect));
        }
        return Ok(effect);
    }
    let fact = parse_fact_application(sexpr, ctx, bindings)?;
    Ok(Effect::Add(fact))
}

/// Splits an effect expression into the parts applied on completion and the
/// parts wrapped in `(at start ...)`.
fn parse_effects(sexpr: &SExpr, ctx: &Ctx, bindings: &Rc<Bindings>) -> Res<(Vec<Effect>, Vec<Effect>)> {
    let mut main = Vec::new();
    let mut at_start = Vec::new();
    for expr in conjuncts(sexpr) {
        if let Some([tp, inner]) = expr.as_application("at") {
            if tp.is_atom("start") {
                let (inner_main, inner_start) = parse_effects(inner, ctx, bindings)?;
                at_start.extend(inner_start);
                at_start.extend(inner_main);
                continue;
            }
            return Err(tp.invalid("expected `start`"));
        }
        main.push(parse_effect(expr, ctx, bindings)?);
    }
    Ok((main, at_start))
}

/// A fact of an `:init` or `:timeless` section: a predicate application or a
/// `(= (fluent ...) value)` assignment.
fn parse_declared_fact(sexpr: &SExpr, ctx: &Ctx, bindings: &Bindings) -> Res<Fact> {
    if let Some([sv, value]) = sexpr.as_application("=") {
        let fact = parse_fluent_application(sv, ctx, bindings)?;
        let value = match parse_term(value, ctx, bindings)? {
            Term::Ent(entity) => entity,
            Term::Num(number) => Entity::from_number(number),
            Term::Fluent(_) => return Err(value.invalid("expected a value, not a fluent")),
        };
        return with_fluent_value(fact, value, sexpr);
    }
    parse_fact_application(sexpr, ctx, bindings)
}

/// Splits `(and a b c)` into its items; a non-conjunction is a single item.
fn conjuncts(sexpr: &SExpr) -> Vec<&SExpr> {
    match sexpr.as_application("and") {
        Some(items) => items.iter().collect(),
        None => match sexpr.as_list() {
            Some(list) if list.iter().is_empty() => Vec::new(),
            _ => vec![sexpr],
        },
    }
}

fn parse_goal_expression(
    sexpr: &SExpr,
    ctx: &Ctx,
    bindings: &Rc<Bindings>,
    max_inactive_seconds: i64,
    group_id: &str,
) -> Res<Goal> {
    let mut persistent = false;
    let mut one_step_towards = false;
    let mut condition_fact = None;
    let mut current = sexpr;
    loop {
        if let Some([inner]) = current.as_application("persist") {
            persistent = true;
            current = inner;
        } else if let Some([inner]) = current.as_application("onesteptowards") {
            one_step_towards = true;
            current = inner;
        } else if let Some([guard, inner]) = current.as_application("imply") {
            match parse_condition(guard, ctx, bindings)? {
                Condition::Fact(optfact) => condition_fact = Some(optfact),
                _ => return Err(guard.invalid("the guard of a goal must be a single fact")),
            }
            current = inner;
        } else {
            break;
        }
    }
    let objective = parse_condition(current, ctx, bindings)?;
    let mut goal = Goal::new(objective)
        .with_max_inactive_seconds(max_inactive_seconds)
        .with_group_id(group_id);
    if persistent {
        goal = goal.persistent();
    }
    if one_step_towards {
        goal = goal.one_step_towards();
    }
    if let Some(condition_fact) = condition_fact {
        goal = goal.activated_by(condition_fact);
    }
    Ok(goal)
}

/// Builds a typed, indexed [`Domain`] from a parsed domain file.
pub fn build_domain(dom: &parser::Domain) -> Res<Domain> {
    let mut ontology = Ontology::default();
    for tpe in &dom.types {
        ontology.types.add_type(tpe.symbol.clone(), tpe.tpe.clone());
    }

    for pred in &dom.predicates {
        let parameters = typed_symbols_to_params(&pred.args, &ontology)?;
        let mut predicate = Predicate::new(pred.name.clone(), parameters, None);
        predicate.source = pred.source.clone();
        ontology.predicates.add(predicate).msg()?;
    }

    for func in &dom.functions {
        let parameters = typed_symbols_to_params(&func.args, &ontology)?;
        let value_type = match func.tpe.as_ref().map(|t| t.canonical_str()) {
            None | Some("number") => crate::Type::number(),
            Some(name) => ontology.types.name_to_type(name).msg()?,
        };
        let mut predicate = Predicate::new(func.name.clone(), parameters, Some(value_type));
        predicate.source = func.source.clone();
        ontology.predicates.add(predicate).msg()?;
    }

    for constant in &dom.constants {
        let tpe = match &constant.tpe {
            Some(tpe) => Some(ontology.types.name_to_type(tpe).msg()?),
            None if ontology.types.is_empty() => None,
            None => {
                return Err((&constant.symbol).invalid(format!("constant `{}` must declare a type", constant.symbol)))
            }
        };
        ontology.constants.add(Entity::new(constant.symbol.clone(), tpe));
    }

    let empty_objects = crate::SetOfEntities::new();

    for derived in &dom.derived {
        let mut head = derived
            .head
            .as_list_iter()
            .ok_or_else(|| derived.head.invalid("Expected a derived predicate head"))?;
        let name = head.pop_atom()?.clone();
        let args = consume_typed_symbols(&mut head)?;
        let parameters = typed_symbols_to_params(&args, &ontology)?;
        let predicate = Predicate::new(name.clone(), parameters.clone(), None);

        let ctx = Ctx { ontology: &ontology };
        let base = Rc::new(Bindings::base(&ontology.constants, &empty_objects));
        let bindings = Rc::new(Bindings::stacked(&parameters, &base));
        let condition =
            parse_condition(&derived.body, &ctx, &bindings).tag(&name, "when parsing derived predicate", None)?;
        ontology.add_derived_predicate(DerivedPredicate::new(predicate, condition));
    }

    let mut actions = BTreeMap::new();
    {
        let ctx = Ctx { ontology: &ontology };
        let base = Rc::new(Bindings::base(&ontology.constants, &empty_objects));
        for a in &dom.actions {
            if actions.contains_key(a.name.canonical_str()) {
                return Err((&a.name).invalid(format!("duplicated action `{}`", a.name)));
            }
            let action = parse_domain_action(a, &ctx, &base).tag(&a.name, "when parsing action", Some(&a.span))?;
            actions.insert(a.name.canonical_string(), action);
        }
    }

    let mut set_of_events = SetOfEvents::new();
    let mut timeless_facts = SetOfFacts::new();
    {
        let ctx = Ctx { ontology: &ontology };
        let base = Rc::new(Bindings::base(&ontology.constants, &empty_objects));
        for e in &dom.events {
            let event = parse_domain_event(e, &ctx, &base).tag(&e.name, "when parsing event", Some(&e.span))?;
            set_of_events.add(event, e.name.canonical_str(), &ontology.types);
        }

        for fact_expr in &dom.timeless {
            let fact = parse_declared_fact(fact_expr, &ctx, &base)?;
            if fact.has_a_param_to_fill() {
                return Err(fact_expr.invalid("timeless facts must be ground"));
            }
            timeless_facts.add(fact, false, &ontology.types);
        }
    }

    let mut domain = Domain::new(actions, ontology)
        .with_name(dom.name.clone())
        .with_timeless_facts(timeless_facts);
    if !set_of_events.is_empty() {
        domain.add_set_of_events(set_of_events, "soe");
    }
    for feature in &dom.features {
        domain.add_requirement(feature.to_string());
    }
    Ok(domain)
}

fn parse_domain_action(a: &parser::Action, ctx: &Ctx, base: &Rc<Bindings>) -> Res<Action> {
    let parameters = typed_symbols_to_params(&a.args, ctx.ontology)?;
    let bindings = Rc::new(Bindings::stacked(&parameters, base));

    let mut preconditions = Vec::new();
    let mut over_all = Vec::new();
    for pre in &a.pre {
        for expr in conjuncts(pre) {
            if let Some([interval, inner]) = expr.as_application("over") {
                if !interval.is_atom("all") {
                    return Err(interval.invalid("expected `all`"));
                }
                over_all.push(parse_condition(inner, ctx, &bindings)?);
            } else {
                preconditions.push(parse_condition(expr, ctx, &bindings)?);
            }
        }
    }

    let mut main_effects = Vec::new();
    let mut at_start_effects = Vec::new();
    for eff in &a.eff {
        let (main, at_start) = parse_effects(eff, ctx, &bindings)?;
        main_effects.extend(main);
        at_start_effects.extend(at_start);
    }

    let precondition = (!preconditions.is_empty()).then(|| Condition::and(preconditions));
    let over_all_condition = (!over_all.is_empty()).then(|| Condition::and(over_all));
    let effect = (!main_effects.is_empty()).then(|| Effect::and(main_effects));
    let at_start_effect = (!at_start_effects.is_empty()).then(|| Effect::and(at_start_effects));

    let mut action = Action::new(precondition, effect)
        .with_parameters(parameters)
        .with_at_start_effect(at_start_effect);
    action.over_all_condition = over_all_condition;
    Ok(action)
}

fn parse_domain_event(e: &parser::Event, ctx: &Ctx, base: &Rc<Bindings>) -> Res<Event> {
    let parameters = typed_symbols_to_params(&e.args, ctx.ontology)?;
    let bindings = Rc::new(Bindings::stacked(&parameters, base));

    let mut preconditions = Vec::new();
    for pre in &e.pre {
        for expr in conjuncts(pre) {
            preconditions.push(parse_condition(expr, ctx, &bindings)?);
        }
    }
    if preconditions.is_empty() {
        return Err((&e.name).invalid(format!("event `{}` must have a precondition", e.name)));
    }

    let mut effects = Vec::new();
    for eff in &e.eff {
        let (main, at_start) = parse_effects(eff, ctx, &bindings)?;
        if !at_start.is_empty() {
            return Err((&e.name).invalid("events cannot carry at-start effects"));
        }
        effects.extend(main);
    }
    if effects.is_empty() {
        return Err((&e.name).invalid(format!("event `{}` must have an effect", e.name)));
    }

    Ok(Event::new(Condition::and(preconditions), Effect::and(effects)).with_parameters(parameters))
}

/// Builds a [`Problem`] (world state, objects, goal stack) from a parsed
/// problem file, against its domain.
pub fn build_problem(pb: &parser::Problem, domain: &Domain) -> Res<Problem> {
    if &pb.domain_name != domain.name() {
        return Err((&pb.domain_name).invalid(format!(
            "problem `{}` is declared for domain `{}`, not `{}`",
            pb.problem_name,
            pb.domain_name,
            domain.name()
        )));
    }

    let mut problem = Problem::for_domain(domain);
    problem.name = pb.problem_name.clone();
    let ontology = domain.ontology();

    for object in &pb.objects {
        let tpe = match &object.tpe {
            Some(tpe) => Some(ontology.types.name_to_type(tpe).msg()?),
            None if ontology.types.is_empty() => None,
            None => return Err((&object.symbol).invalid(format!("object `{}` must declare a type", object.symbol))),
        };
        problem.objects.add(Entity::new(object.symbol.clone(), tpe));
    }

    let no_callbacks = SetOfCallbacks::default();
    {
        let ctx = Ctx { ontology };
        let bindings = Bindings::base(&ontology.constants, &problem.objects);
        for init in &pb.init {
            let fact = parse_declared_fact(init, &ctx, &bindings)?;
            if fact.has_a_param_to_fill() {
                return Err(init.invalid("init facts must be ground"));
            }
            problem.world_state.add_fact(
                fact,
                domain.set_of_events(),
                &no_callbacks,
                ontology,
                &problem.objects,
            );
        }
    }

    let mut goals = Vec::new();
    {
        let ctx = Ctx { ontology };
        let base = Rc::new(Bindings::base(&ontology.constants, &problem.objects));
        for goal in &pb.goal {
            for expr in conjuncts(goal) {
                goals.push(parse_goal_expression(expr, &ctx, &base, -1, "")?);
            }
        }
    }
    problem.goal_stack.set_goals(goals, GoalStack::DEFAULT_PRIORITY);

    Ok(problem)
}

/// Parses and converts a PDDL domain file.
pub fn pddl_to_domain(input: Input) -> Res<Domain> {
    let parsed = parse_pddl_domain(input)?;
    build_domain(&parsed)
}

/// Parses and converts a PDDL problem file against its domain.
pub fn pddl_to_problem(input: Input, domain: &Domain) -> Res<Problem> {
    let parsed = parse_pddl_problem(input)?;
    build_problem(&parsed, domain)
}

fn parse_str(s: &str) -> Res<SExpr> {
    parse(Arc::new(Input::from_string(s)))
}

fn scoped_bindings(
    ontology: &Ontology,
    objects: &crate::SetOfEntities,
    parameters: &[Param],
) -> Rc<Bindings> {
    let base = Rc::new(Bindings::base(&ontology.constants, objects));
    Rc::new(Bindings::stacked(parameters, &base))
}

/// Parses a single condition expression, e.g. `(not (lock e2))`.
pub fn pddl_to_condition(
    s: &str,
    ontology: &Ontology,
    objects: &crate::SetOfEntities,
    parameters: &[Param],
) -> Res<Condition> {
    let sexpr = parse_str(s)?;
    let ctx = Ctx { ontology };
    parse_condition(&sexpr, &ctx, &scoped_bindings(ontology, objects, parameters))
}

/// Parses a single effect expression, e.g. `(not (lock ?e))`.
pub fn pddl_to_effect(
    s: &str,
    ontology: &Ontology,
    objects: &crate::SetOfEntities,
    parameters: &[Param],
) -> Res<Effect> {
    let sexpr = parse_str(s)?;
    let ctx = Ctx { ontology };
    let bindings = scoped_bindings(ontology, objects, parameters);
    let (main, at_start) = parse_effects(&sexpr, &ctx, &bindings)?;
    if !at_start.is_empty() {
        return Err(Message::error("at-start effects are only allowed inside an action definition"));
    }
    Ok(Effect::and(main))
}

/// Parses a fact, e.g. `(lock e2)` or `(= (fun1 sub3a) toto)`.
pub fn pddl_to_fact(
    s: &str,
    ontology: &Ontology,
    objects: &crate::SetOfEntities,
    parameters: &[Param],
) -> Res<Fact> {
    let sexpr = parse_str(s)?;
    let ctx = Ctx { ontology };
    let bindings = scoped_bindings(ontology, objects, parameters);
    parse_declared_fact(&sexpr, &ctx, &bindings)
}

/// Parses a goal, possibly wrapped in `(persist ...)`, `(oneStepTowards ...)`
/// or `(imply <fact> ...)`.
pub fn pddl_to_goal(
    s: &str,
    ontology: &Ontology,
    objects: &crate::SetOfEntities,
    max_inactive_seconds: i64,
    group_id: &str,
) -> Res<Goal> {
    let sexpr = parse_str(s)?;
    let ctx = Ctx { ontology };
    let bindings = Rc::new(Bindings::base(&ontology.constants, objects));
    parse_goal_expression(&sexpr, &ctx, &bindings, max_inactive_seconds, group_id)
}

/// Parses a `?name - type` parameter list, e.g. `(?e - ent ?l - location)`.
pub fn pddl_to_parameters(s: &str, types: &crate::types::SetOfTypes) -> Res<Vec<Param>> {
    let sexpr = parse_str(s)?;
    let mut list = sexpr
        .as_list_iter()
        .ok_or_else(|| sexpr.invalid("Expected a parameter list"))?;
    let symbols = consume_typed_symbols(&mut list)?;
    let mut params = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let tpe = match &symbol.tpe {
            Some(tpe) => Some(types.name_to_type(tpe).msg()?),
            None if types.is_empty() => None,
            None => return Err((&symbol.symbol).invalid(format!("parameter `{}` must declare a type", symbol.symbol))),
        };
        params.push(Param::new(symbol.symbol, tpe));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::EvalEnv;

    fn locks_domain() -> Domain {
        let source = "(define (domain locks)
            (:requirements :strips :typing :negative-preconditions :derived-predicates)
            (:types ent)
            (:constants e1 e2 e3 - ent)
            (:predicates (lock ?e - ent) (fact_a))
            (:timeless (lock e3))
            (:derived (free ?e - ent) (not (lock ?e)))
            (:action unlock
                :parameters (?e - ent)
                :effect (not (lock ?e)))
            (:action finish
                :parameters ()
                :precondition (not (lock e2))
                :effect (fact_a)))";
        pddl_to_domain(Input::from_string(source)).unwrap()
    }

    #[test]
    fn domain_conversion() {
        let domain = locks_domain();
        assert_eq!(domain.name().canonical_str(), "locks");
        assert_eq!(domain.actions().len(), 2);
        assert!(domain.ontology().predicates.get("lock").is_some());
        assert!(domain.ontology().derived_predicate("free").is_some());
        assert_eq!(domain.timeless_facts().facts().len(), 1);
        assert!(domain.requirements().contains(":typing"));

        let unlock = domain.action("unlock").unwrap();
        assert_eq!(unlock.parameters.len(), 1);
        assert!(unlock.precondition.is_none());
        assert!(domain.actions_without_precondition().contains("unlock"));
        assert!(!domain.actions_without_precondition().contains("finish"));
    }

    #[test]
    fn problem_conversion() {
        let domain = locks_domain();
        let source = "(define (problem locks-1)
            (:domain locks)
            (:init (lock e2))
            (:goal (and (fact_a))))";
        let problem = pddl_to_problem(Input::from_string(source), &domain).unwrap();

        // the timeless fact is injected next to the declared init facts
        assert_eq!(problem.world_state.facts().facts().len(), 2);
        let env = EvalEnv {
            world: &problem.world_state,
            ontology: domain.ontology(),
            objects: &problem.objects,
        };
        assert!(problem.goal_stack.first_pending_goal(env).is_some());
    }

    #[test]
    fn problem_for_the_wrong_domain_is_rejected() {
        let domain = locks_domain();
        let source = "(define (problem other-1) (:domain other) (:init) (:goal (fact_a)))";
        assert!(pddl_to_problem(Input::from_string(source), &domain).is_err());
    }

    #[test]
    fn derived_predicates_expand_to_their_condition() {
        let domain = locks_domain();
        let condition = pddl_to_condition("(free e1)", domain.ontology(), &crate::SetOfEntities::new(), &[]).unwrap();
        assert_eq!(condition.to_pddl(), "(not (lock e1))");
    }

    #[test]
    fn when_is_rejected_in_conditions() {
        let domain = locks_domain();
        let objects = crate::SetOfEntities::new();
        assert!(pddl_to_condition("(when (lock e1) (fact_a))", domain.ontology(), &objects, &[]).is_err());
    }

    #[test]
    fn quantified_conditions() {
        let domain = locks_domain();
        let objects = crate::SetOfEntities::new();
        let condition =
            pddl_to_condition("(forall (?e - ent) (lock ?e))", domain.ontology(), &objects, &[]).unwrap();
        assert_eq!(condition.to_pddl(), "(forall (?e - ent) (lock ?e))");
        let condition =
            pddl_to_condition("(exists (?e - ent) (not (lock ?e)))", domain.ontology(), &objects, &[]).unwrap();
        assert_eq!(condition.to_pddl(), "(exists (?e - ent) (not (lock ?e)))");
    }

    #[test]
    fn unknown_symbols_are_reported() {
        let domain = locks_domain();
        let objects = crate::SetOfEntities::new();
        assert!(pddl_to_condition("(lock e9)", domain.ontology(), &objects, &[]).is_err());
        assert!(pddl_to_condition("(padlock e1)", domain.ontology(), &objects, &[]).is_err());
        assert!(pddl_to_condition("(lock ?unbound)", domain.ontology(), &objects, &[]).is_err());
        assert!(pddl_to_fact("(lock e1 e2)", domain.ontology(), &objects, &[]).is_err());
    }

    #[test]
    fn printed_domain_parses_back() {
        let domain = locks_domain();
        let printed = crate::pddl::printer::domain_to_pddl(&domain);
        let reparsed = pddl_to_domain(Input::from_string(&printed)).unwrap();
        assert_eq!(reparsed.name(), domain.name());
        assert_eq!(reparsed.actions().len(), domain.actions().len());
        assert_eq!(reparsed.timeless_facts().facts().len(), 1);
    }
}
