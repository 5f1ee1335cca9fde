//! Term → category lookup table.
//!
//! The built-in table covers common technology keywords grouped by category.
//! A term listed under more than one category belongs to the first category
//! in table order (e.g. `java` is Backend, not Mobile).
//!
//! Custom tables can be loaded from a CSV file with the columns
//! `term,category[,display]`, and raw observations from a CSV with the
//! columns `term,count`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::entity::Category;
use crate::scoring::TermObservation;

/// A lookup-table entry: canonical display name plus category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    pub display: String,
    pub category: Category,
}

/// Case-insensitive term → category table.
#[derive(Debug, Clone, Default)]
pub struct TermLookup {
    entries: HashMap<String, TermEntry>,
}

const BUILTIN_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Frontend,
        &[
            "angular", "react", "vue", "vuejs", "svelte", "nextjs", "next.js", "nuxt", "nuxtjs",
            "ember", "backbone", "jquery", "typescript", "javascript", "html", "html5", "css",
            "css3", "sass", "scss", "less", "tailwind", "tailwindcss", "bootstrap",
            "material-ui", "mui", "chakra", "styled-components", "webpack", "vite", "parcel",
            "rollup", "esbuild", "rxjs", "ngrx", "redux", "mobx", "vuex", "pinia", "zustand",
            "webcomponents", "web components", "lit", "stencil",
        ],
    ),
    (
        Category::Backend,
        &[
            "python", "fastapi", "django", "flask", "tornado", "pyramid", "bottle", "aiohttp",
            "sanic", "quart", "nodejs", "node.js", "express", "expressjs", "nestjs", "koa",
            "hapi", "fastify", "adonisjs", "spring", "spring boot", "springboot", "java",
            "hibernate", "quarkus", "micronaut", "c#", "csharp", ".net", "dotnet", "asp.net",
            "php", "laravel", "symfony", "codeigniter", "cakephp", "ruby", "rails",
            "ruby on rails", "sinatra", "go", "golang", "gin", "fiber", "rust", "actix",
            "rocket", "axum", "graphql", "rest", "rest api", "grpc", "websocket",
        ],
    ),
    (
        Category::Database,
        &[
            "postgresql", "postgres", "mysql", "mariadb", "sqlite", "sql server", "mssql",
            "oracle", "db2", "mongodb", "mongo", "couchdb", "couchbase", "redis", "memcached",
            "dynamodb", "cassandra", "hbase", "scylla", "neo4j", "arangodb", "dgraph",
            "elasticsearch", "opensearch", "solr", "influxdb", "timescaledb", "prometheus",
            "firebase", "firestore", "supabase",
        ],
    ),
    (
        Category::DevOps,
        &[
            "docker", "podman", "containerd", "kubernetes", "k8s", "openshift", "nomad",
            "docker swarm", "rancher", "helm", "kustomize", "jenkins", "gitlab ci",
            "github actions", "circleci", "travis", "bamboo", "teamcity", "azure devops",
            "argocd", "flux", "terraform", "terragrunt", "pulumi", "cloudformation", "ansible",
            "puppet", "chef", "saltstack", "aws", "azure", "gcp", "google cloud",
            "digitalocean", "heroku", "vercel", "netlify", "cloudflare", "grafana", "datadog",
            "new relic", "dynatrace", "elk", "logstash", "kibana", "splunk", "nginx", "apache",
            "traefik", "haproxy", "envoy", "linux", "ubuntu", "debian", "centos", "rhel",
            "alpine", "git", "github", "gitlab", "bitbucket", "ci/cd",
        ],
    ),
    (
        Category::AiMl,
        &[
            "tensorflow", "pytorch", "keras", "scikit-learn", "sklearn", "jax", "mxnet",
            "caffe", "openai", "gpt", "llm", "gemini", "mistral", "langchain", "llamaindex",
            "huggingface", "transformers", "nlp", "spacy", "nltk", "bert", "opencv",
            "computer vision", "yolo", "pandas", "numpy", "scipy", "matplotlib", "seaborn",
            "plotly", "jupyter", "mlflow", "kubeflow", "airflow", "prefect", "vertex ai",
            "sagemaker", "azure ml", "databricks", "deep learning", "machine learning",
            "reinforcement learning", "neural network",
        ],
    ),
    (
        Category::Mobile,
        &[
            "flutter", "react native", "ionic", "cordova", "capacitor", "xamarin",
            "nativescript", "swift", "swiftui", "objective-c", "ios", "xcode", "kotlin",
            "android", "jetpack compose", "dart",
        ],
    ),
    (
        Category::Testing,
        &[
            "jest", "jasmine", "mocha", "chai", "karma", "cypress", "playwright", "selenium",
            "puppeteer", "testcafe", "pytest", "unittest", "behave", "junit", "testng",
            "mockito", "tdd", "bdd", "sonarqube", "eslint", "prettier",
        ],
    ),
    (
        Category::Cloud,
        &[
            "s3", "ec2", "lambda", "rds", "cloudfront", "route53", "ecs", "eks", "fargate",
            "cloud run", "cloud functions", "bigquery", "cloud storage", "app engine",
            "compute engine", "gke", "azure functions", "cosmos db", "blob storage", "aks",
            "serverless",
        ],
    ),
    (
        Category::Other,
        &[
            "svn", "mercurial", "scrum", "agile", "kanban", "jira", "confluence", "notion",
            "microservices", "event-driven", "cqrs", "domain-driven design", "ddd",
            "clean architecture", "mqtt", "amqp", "oauth", "jwt", "tls",
        ],
    ),
];

/// Spellings that title-casing gets wrong.
const CANONICAL_NAMES: &[(&str, &str)] = &[
    ("typescript", "TypeScript"),
    ("javascript", "JavaScript"),
    ("html", "HTML"),
    ("html5", "HTML5"),
    ("css", "CSS"),
    ("css3", "CSS3"),
    ("nextjs", "Next.js"),
    ("next.js", "Next.js"),
    ("nodejs", "Node.js"),
    ("node.js", "Node.js"),
    ("fastapi", "FastAPI"),
    ("graphql", "GraphQL"),
    ("grpc", "gRPC"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mongodb", "MongoDB"),
    ("devops", "DevOps"),
    ("aws", "AWS"),
    ("gcp", "GCP"),
    ("ci/cd", "CI/CD"),
    ("github", "GitHub"),
    ("gitlab", "GitLab"),
    ("github actions", "GitHub Actions"),
    ("tensorflow", "TensorFlow"),
    ("pytorch", "PyTorch"),
    ("openai", "OpenAI"),
    ("llm", "LLM"),
    ("nlp", "NLP"),
    ("opencv", "OpenCV"),
    ("numpy", "NumPy"),
    ("scikit-learn", "scikit-learn"),
    ("ios", "iOS"),
    ("swiftui", "SwiftUI"),
    ("tdd", "TDD"),
    ("bdd", "BDD"),
    ("sonarqube", "SonarQube"),
    ("eslint", "ESLint"),
    ("s3", "S3"),
    ("ec2", "EC2"),
    ("gke", "GKE"),
    ("aks", "AKS"),
    ("jwt", "JWT"),
    ("tls", "TLS"),
    ("k8s", "K8s"),
    ("c#", "C#"),
    (".net", ".NET"),
    ("asp.net", "ASP.NET"),
    ("php", "PHP"),
];

impl TermLookup {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in technology table.
    pub fn builtin() -> Self {
        let mut lookup = Self::new();
        for (category, terms) in BUILTIN_TABLE {
            for term in terms.iter() {
                // First category wins for duplicated terms.
                if !lookup.contains(term) {
                    lookup.insert(term, *category, None);
                }
            }
        }
        lookup
    }

    /// Insert or replace a term. Without an explicit display name, a
    /// canonical spelling or the title-cased term is used.
    pub fn insert(&mut self, term: &str, category: Category, display: Option<&str>) {
        let key = normalize_term(term);
        if key.is_empty() {
            return;
        }
        let display = match display {
            Some(d) if !d.trim().is_empty() => d.trim().to_string(),
            _ => display_name(&key),
        };
        self.entries.insert(key, TermEntry { display, category });
    }

    pub fn get(&self, term: &str) -> Option<&TermEntry> {
        self.entries.get(&normalize_term(term))
    }

    pub fn contains(&self, term: &str) -> bool {
        self.get(term).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonical spelling if known, otherwise title case per word.
fn display_name(key: &str) -> String {
    if let Some((_, name)) = CANONICAL_NAMES.iter().find(|(k, _)| *k == key) {
        return name.to_string();
    }
    key.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Load a custom lookup table from a CSV file with a header row and the
/// columns `term,category[,display]`.
///
/// Rows with an unknown category are skipped with a debug message.
pub fn read_term_table_csv<P: AsRef<Path>>(path: P) -> Result<TermLookup> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open term table: {}", path.display()))?;

    let mut lookup = TermLookup::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Malformed row {} in {}", row + 2, path.display()))?;
        let term = record.get(0).unwrap_or("");
        let category = match Category::parse(record.get(1).unwrap_or("")) {
            Some(c) => c,
            None => {
                debug!("Skipping term '{}' with unknown category", term);
                continue;
            }
        };
        lookup.insert(term, category, record.get(2));
    }
    Ok(lookup)
}

/// Load raw `(term, count)` observations from a CSV file with a header row.
///
/// Rows whose count does not parse are skipped; they are treated as
/// malformed input rather than a failure of the whole list.
pub fn read_observations_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TermObservation>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open observations: {}", path.display()))?;

    let mut observations = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let term = record.get(0).unwrap_or("");
        match record.get(1).unwrap_or("").parse::<u32>() {
            Ok(count) if !term.is_empty() => observations.push(TermObservation::new(term, count)),
            _ => debug!("Skipping malformed observation row: {:?}", record),
        }
    }
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_first_category_wins() {
        let lookup = TermLookup::builtin();
        assert_eq!(lookup.get("java").unwrap().category, Category::Backend);
        assert_eq!(lookup.get("Angular").unwrap().category, Category::Frontend);
        assert_eq!(lookup.get("DOCKER").unwrap().category, Category::DevOps);
        assert_eq!(lookup.get("python").unwrap().category, Category::Backend);
    }

    #[test]
    fn test_display_names() {
        let lookup = TermLookup::builtin();
        assert_eq!(lookup.get("typescript").unwrap().display, "TypeScript");
        assert_eq!(lookup.get("spring boot").unwrap().display, "Spring Boot");
        assert_eq!(lookup.get("  spring   BOOT ").unwrap().display, "Spring Boot");
    }

    #[test]
    fn test_read_term_table_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "term,category,display").unwrap();
        writeln!(file, "bevy,Backend,Bevy Engine").unwrap();
        writeln!(file, "wasm,frontend").unwrap();
        writeln!(file, "tarot,astrology").unwrap();
        file.flush().unwrap();

        let lookup = read_term_table_csv(file.path()).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get("BEVY").unwrap().display, "Bevy Engine");
        assert_eq!(lookup.get("wasm").unwrap().category, Category::Frontend);
        assert!(!lookup.contains("tarot"));
    }

    #[test]
    fn test_read_observations_skips_malformed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "term,count").unwrap();
        writeln!(file, "Angular,12").unwrap();
        writeln!(file, "Python,lots").unwrap();
        writeln!(file, "Docker,4").unwrap();
        file.flush().unwrap();

        let obs = read_observations_csv(file.path()).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].term, "Angular");
        assert_eq!(obs[1].count, 4);
    }
}
