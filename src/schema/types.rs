// ABOUTME: Portable column types parsed from catalog type strings
// ABOUTME: Bridges declared types of one dialect to DDL of another

/// Dialect-independent shape of a declared column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Boolean,
    Real,
    Double,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Char(Option<u32>),
    Varchar(Option<u32>),
    Text,
    Blob,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Json,
    Uuid,
    /// Anything unrecognised, kept verbatim
    Other(String),
}

impl ColumnType {
    /// Parse a catalog type string such as `character varying(255)`,
    /// `int(11) unsigned` or `NUMERIC(10,2)`.
    pub fn parse(declared: &str) -> ColumnType {
        let lower = declared.trim().to_lowercase();
        let (base, args) = split_args(&lower);
        let base = base
            .trim_end_matches(" unsigned")
            .trim_end_matches(" zerofill")
            .trim();

        match base {
            "smallint" | "int2" | "smallserial" => ColumnType::SmallInt,
            "tinyint" if args.first() == Some(&1) => ColumnType::Boolean,
            "tinyint" => ColumnType::SmallInt,
            "integer" | "int" | "int4" | "mediumint" | "serial" => ColumnType::Integer,
            "bigint" | "int8" | "bigserial" => ColumnType::BigInt,
            "boolean" | "bool" => ColumnType::Boolean,
            "real" | "float4" | "float" => ColumnType::Real,
            "double" | "double precision" | "float8" => ColumnType::Double,
            "numeric" | "decimal" => ColumnType::Decimal {
                precision: args.first().copied(),
                scale: args.get(1).copied(),
            },
            "character varying" | "varchar" | "nvarchar" | "varchar2" => {
                ColumnType::Varchar(args.first().copied())
            }
            "character" | "char" | "nchar" | "bpchar" => ColumnType::Char(args.first().copied()),
            "text" | "tinytext" | "mediumtext" | "longtext" | "clob" | "citext" => ColumnType::Text,
            "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                ColumnType::Blob
            }
            "date" => ColumnType::Date,
            "time" | "time without time zone" => ColumnType::Time,
            "timestamp" | "timestamp without time zone" | "datetime" => ColumnType::Timestamp,
            "timestamp with time zone" | "timestamptz" => ColumnType::TimestampTz,
            "json" | "jsonb" => ColumnType::Json,
            "uuid" => ColumnType::Uuid,
            _ => ColumnType::Other(declared.trim().to_string()),
        }
    }

    /// Declared maximum length in characters, for bounded character types.
    pub fn max_length(&self) -> Option<usize> {
        match self {
            ColumnType::Char(Some(n)) | ColumnType::Varchar(Some(n)) => Some(*n as usize),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }
}

/// Split `name(a,b) suffix` into (`name suffix`, [a, b]).
fn split_args(declared: &str) -> (String, Vec<u32>) {
    let Some(open) = declared.find('(') else {
        return (declared.to_string(), Vec::new());
    };
    let Some(close) = declared[open..].find(')').map(|i| open + i) else {
        return (declared.to_string(), Vec::new());
    };

    let args = declared[open + 1..close]
        .split(',')
        .filter_map(|a| a.trim().parse::<u32>().ok())
        .collect();

    // `timestamp(6) with time zone` keeps its suffix
    let mut base = declared[..open].trim_end().to_string();
    let rest = declared[close + 1..].trim();
    if !rest.is_empty() {
        base.push(' ');
        base.push_str(rest);
    }
    (base, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounded_strings() {
        assert_eq!(ColumnType::parse("varchar(255)"), ColumnType::Varchar(Some(255)));
        assert_eq!(
            ColumnType::parse("character varying(40)"),
            ColumnType::Varchar(Some(40))
        );
        assert_eq!(ColumnType::parse("character varying"), ColumnType::Varchar(None));
        assert_eq!(ColumnType::parse("CHAR(2)"), ColumnType::Char(Some(2)));
        assert_eq!(ColumnType::parse("character(3)"), ColumnType::Char(Some(3)));
    }

    #[test]
    fn test_parse_mysql_integer_forms() {
        assert_eq!(ColumnType::parse("int(11)"), ColumnType::Integer);
        assert_eq!(ColumnType::parse("int(10) unsigned"), ColumnType::Integer);
        assert_eq!(ColumnType::parse("bigint(20) unsigned"), ColumnType::BigInt);
        assert_eq!(ColumnType::parse("tinyint(1)"), ColumnType::Boolean);
        assert_eq!(ColumnType::parse("tinyint(4)"), ColumnType::SmallInt);
    }

    #[test]
    fn test_parse_decimal_arguments() {
        assert_eq!(
            ColumnType::parse("numeric(10,2)"),
            ColumnType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(
            ColumnType::parse("decimal"),
            ColumnType::Decimal {
                precision: None,
                scale: None
            }
        );
    }

    #[test]
    fn test_parse_timestamps_with_precision() {
        assert_eq!(
            ColumnType::parse("timestamp(6) with time zone"),
            ColumnType::TimestampTz
        );
        assert_eq!(
            ColumnType::parse("timestamp without time zone"),
            ColumnType::Timestamp
        );
        assert_eq!(ColumnType::parse("datetime"), ColumnType::Timestamp);
    }

    #[test]
    fn test_parse_text_and_blob_families() {
        for t in ["text", "mediumtext", "LONGTEXT", "tinytext"] {
            assert_eq!(ColumnType::parse(t), ColumnType::Text, "{}", t);
        }
        for t in ["bytea", "blob", "longblob", "varbinary(16)"] {
            assert_eq!(ColumnType::parse(t), ColumnType::Blob, "{}", t);
        }
    }

    #[test]
    fn test_unknown_type_kept_verbatim() {
        assert_eq!(
            ColumnType::parse("tsvector"),
            ColumnType::Other("tsvector".to_string())
        );
        assert_eq!(
            ColumnType::parse(" Geometry "),
            ColumnType::Other("Geometry".to_string())
        );
    }

    #[test]
    fn test_max_length() {
        assert_eq!(ColumnType::parse("varchar(5)").max_length(), Some(5));
        assert_eq!(ColumnType::parse("char(1)").max_length(), Some(1));
        assert_eq!(ColumnType::parse("varchar").max_length(), None);
        assert_eq!(ColumnType::parse("text").max_length(), None);
        assert_eq!(ColumnType::parse("numeric(10,2)").max_length(), None);
    }
}
