mod statement_test;
